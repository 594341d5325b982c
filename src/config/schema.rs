//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message bus connection
    pub bus: BusConfig,
    /// Serial side of the bridge
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values no bridge could run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bus.host.trim().is_empty() {
            return Err(ConfigError::validation("bus.host", "must not be empty"));
        }
        if self.bus.port == 0 {
            return Err(ConfigError::validation("bus.port", "must be non-zero"));
        }
        let root = &self.bus.topic_root;
        if root.is_empty() || root.ends_with('/') || root.contains(['+', '#']) {
            return Err(ConfigError::validation(
                "bus.topic_root",
                format!("'{root}' is not a usable topic prefix"),
            ));
        }
        if self.bus.keep_alive_secs < 5 {
            return Err(ConfigError::validation("bus.keep_alive_secs", "must be at least 5"));
        }
        if self.bus.channel_capacity == 0 {
            return Err(ConfigError::validation("bus.channel_capacity", "must be at least 1"));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::validation("serial.read_timeout_ms", "must be at least 1"));
        }
        Ok(())
    }
}

/// Message bus (MQTT) connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client identifier; a random one is generated when unset
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Prefix of every topic the bridge uses
    pub topic_root: String,
    pub keep_alive_secs: u64,
    /// Capacity of the client request queue and the inbound message queue
    pub channel_capacity: usize,
    /// How long to wait for the broker to accept the first connection
    pub connect_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            topic_root: "serial-adapter".to_string(),
            keep_alive_secs: 30,
            channel_capacity: 64,
            connect_timeout_secs: 10,
        }
    }
}

impl BusConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Full topic name for `suffix` under the topic root.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_root, suffix)
    }
}

/// Serial side settings that are not part of the adapter settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// JSON adapter settings file (portName, bitRate, ...)
    pub settings_path: Option<PathBuf>,
    /// Driver timeout for each read while draining
    pub read_timeout_ms: u64,
    /// Pause after a read that produced nothing
    pub idle_backoff_ms: u64,
    /// How long shutdown waits for the read loop and in-flight requests
    pub shutdown_grace_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            read_timeout_ms: 500,
            idle_backoff_ms: 10,
            shutdown_grace_ms: 2000,
        }
    }
}

impl SerialConfig {
    /// Get read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
