//! Configuration error types for the config module.

use std::path::PathBuf;
use thiserror::Error;

/// Reason recorded when a required adapter setting is absent.
pub const MISSING: &str = "missing";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found at expected path
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read a config or settings file
    #[error("Failed to read configuration file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Adapter settings file is not a JSON object
    #[error("Failed to parse adapter settings '{path}': {message}")]
    SettingsParseError { path: PathBuf, message: String },

    /// An adapter setting is missing or outside its domain
    #[error("Invalid adapter setting '{field}': {reason}")]
    Setting { field: String, reason: String },

    /// Invalid value in the bridge configuration file
    #[error("Invalid configuration value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// Environment variable parse error
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    /// Create an adapter-setting error for `field`.
    pub fn setting<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::Setting {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create the error reported when a required adapter setting is absent.
    pub fn missing<F: Into<String>>(field: F) -> Self {
        Self::setting(field, MISSING)
    }

    /// Create a validation error
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an env parse error
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Name of the offending adapter setting, if this error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Setting { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Why the adapter setting was rejected, if this error concerns one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Setting { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_setting() {
        let err = ConfigError::missing("portName");
        assert_eq!(err.field(), Some("portName"));
        assert_eq!(err.reason(), Some(MISSING));
        assert_eq!(err.to_string(), "Invalid adapter setting 'portName': missing");
    }

    #[test]
    fn test_non_setting_errors_have_no_field() {
        let err = ConfigError::validation("bus.port", "must be non-zero");
        assert_eq!(err.field(), None);
        assert!(err.to_string().contains("bus.port"));
    }
}
