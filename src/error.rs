use crate::bus::BusError;
use crate::config::ConfigError;
use crate::port::PortError;
use std::fmt;

/// A specialized `Result` type for bridge startup and shutdown.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// Only failures that stop the bridge end up here. Per-request port errors
/// are published on the error topic instead.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Port(PortError),
    Bus(BusError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Port(e) => write!(f, "Serial port could not be opened: {e}"),
            Self::Bus(e) => write!(f, "Message bus error: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Port(e) => Some(e),
            Self::Bus(e) => Some(e),
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        AppError::Port(err)
    }
}

impl From<BusError> for AppError {
    fn from(err: BusError) -> Self {
        AppError::Bus(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_converts() {
        let err: AppError = ConfigError::missing("bitRate").into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid adapter setting 'bitRate': missing"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_port_error_converts() {
        let err: AppError = PortError::unavailable("COM7").into();
        assert!(matches!(err, AppError::Port(_)));
        assert!(err.to_string().contains("COM7"));
    }
}
