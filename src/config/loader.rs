//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use super::settings::RawSettings;
use directories::ProjectDirs;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_ADAPTER";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_ADAPTER_CONFIG";

/// Application name used for the platform config directory.
const APP_NAME: &str = "serial-adapter";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_ADAPTER_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. `serial-adapter/config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform config directory for the bridge.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
    debug!(path = %path.display(), "configuration file loaded");
    Ok(config)
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{ENV_PREFIX}_{key}");
    std::env::var(&var).ok().map(|value| (var, value))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_ADAPTER_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_ADAPTER_BUS_HOST=broker.local`
/// - `SERIAL_ADAPTER_SERIAL_READ_TIMEOUT_MS=250`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Bus overrides
    if let Some((_, val)) = env_var("BUS_HOST") {
        config.bus.host = val;
    }
    if let Some((var, val)) = env_var("BUS_PORT") {
        config.bus.port = val
            .parse()
            .map_err(|_| ConfigError::env_parse(var, "Invalid port number"))?;
    }
    if let Some((_, val)) = env_var("BUS_TOPIC_ROOT") {
        config.bus.topic_root = val;
    }

    // Serial overrides
    if let Some((_, val)) = env_var("SERIAL_SETTINGS_PATH") {
        config.serial.settings_path = Some(PathBuf::from(val));
    }
    if let Some((var, val)) = env_var("SERIAL_READ_TIMEOUT_MS") {
        config.serial.read_timeout_ms = val
            .parse()
            .map_err(|_| ConfigError::env_parse(var, "Invalid timeout"))?;
    }

    // Logging overrides
    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }

    Ok(())
}

/// Read the JSON adapter settings file at `path`.
///
/// The file must hold a single JSON object.
pub fn load_adapter_settings(path: impl AsRef<Path>) -> ConfigResult<RawSettings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let parse_error = |message: String| ConfigError::SettingsParseError {
        path: path.to_path_buf(),
        message,
    };
    match serde_json::from_str::<Value>(&content).map_err(|e| parse_error(e.to_string()))? {
        Value::Object(map) => {
            debug!(path = %path.display(), keys = map.len(), "adapter settings loaded");
            Ok(map)
        }
        other => Err(parse_error(format!(
            "expected a JSON object, found {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
