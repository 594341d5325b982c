//! Serial MQTT Adapter Library
//!
//! Bridges a serial device to an MQTT broker. Requests arrive on
//! `<topic_root>/read` and `<topic_root>/write`; data read from the device is
//! published hex-encoded on `<topic_root>/response`, failures on
//! `<topic_root>/error`. A background read loop keeps the device drained
//! between requests.
//!
//! # Modules
//!
//! - `config`: Bridge configuration (TOML) and adapter settings validation
//! - `port`: Serial transport, mock adapter and duplex coordination
//! - `bus`: Publisher abstraction and the MQTT client
//! - `service`: Bridge context, read loop and request router
//! - `error`: Top-level error type for the binary

pub mod bus;
pub mod config;
pub mod error;
pub mod port;
pub mod service;

// Re-export commonly used types for convenience
pub use bus::{BusError, ChannelPublisher, InboundMessage, MqttConnection, Publisher};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, PortSettings};
pub use error::{AppError, AppResult};
pub use port::{
    DuplexCoordinator, DuplexMode, MockSerialPort, PortError, PortErrorKind, PortHandle,
    SerialPortAdapter, SyncSerialPort,
};
pub use service::{BridgeService, IoEvent, Operation, ReadLoop, RequestRouter};
