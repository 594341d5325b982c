//! Configuration for the bridge.
//!
//! Two inputs configure a running bridge:
//!
//! - the bridge configuration (`config.toml`): broker connection, topic root,
//!   serial timing and logging. TOML, with environment variable overrides.
//! - the adapter settings (JSON): which port to open and how. These are
//!   validated into [`PortSettings`] by [`validate`].
//!
//! # Configuration Resolution
//!
//! The bridge configuration is loaded from the following locations (in order
//! of priority):
//!
//! 1. `--config <path>` on the command line
//! 2. `SERIAL_ADAPTER_CONFIG` environment variable (explicit path)
//! 3. `./config.toml` (current directory)
//! 4. `serial-adapter/config.toml` in the platform config directory
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_ADAPTER_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_ADAPTER_BUS_HOST=broker.local`
//! - `SERIAL_ADAPTER_SERIAL_SETTINGS_PATH=/etc/serial-adapter/port.json`
//! - `SERIAL_ADAPTER_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,ignore
//! use serial_mqtt_adapter::config::{load_adapter_settings, validate, ConfigLoader};
//!
//! let config = ConfigLoader::load()?.into_config();
//! let raw = load_adapter_settings("port.json")?;
//! let settings = validate(&raw)?.with_poll_timeout(config.serial.read_timeout());
//! ```

mod error;
mod loader;
mod schema;
mod settings;

pub use error::{ConfigError, ConfigResult, MISSING};
pub use loader::{
    get_default_config_dir, get_default_config_path, load_adapter_settings, resolve_config_path,
    ConfigLoader,
};
pub use schema::{BusConfig, Config, LogFormat, LoggingConfig, SerialConfig};
pub use settings::{keys, validate, PortSettings, RawSettings, BIT_RATES, DEFAULT_POLL_TIMEOUT};
