//! Port-specific error types.
//!
//! Defines error types for serial port operations, separate from application-level
//! errors to maintain clean separation of concerns.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device could not be opened (absent, busy, or unplugged).
    #[error("Serial port unavailable: {0}")]
    PortUnavailable(String),

    /// A line or timing parameter was rejected.
    #[error("Invalid serial parameter: {0}")]
    InvalidParameter(String),

    /// The OS refused access to the device.
    #[error("Permission denied for serial port: {0}")]
    PermissionDenied(String),

    /// Reading from the device failed for a reason other than "no data".
    #[error("Read failure: {0}")]
    ReadFailure(String),

    /// The device stopped accepting bytes before the payload was sent.
    #[error("Short write: {written} of {expected} bytes written")]
    ShortWrite { written: usize, expected: usize },

    /// The payload was not valid hexadecimal.
    #[error("Invalid hex payload: {0}")]
    Encoding(#[from] hex::FromHexError),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The handle has already been closed.
    #[error("Port is already closed")]
    AlreadyClosed,

    /// An I/O error reported by the adapter.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Coarse classification of a [`PortError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortErrorKind {
    PortUnavailable,
    InvalidParameter,
    PermissionDenied,
    ReadFailure,
    ShortWrite,
    EncodingError,
    Timeout,
    AlreadyClosed,
    Other,
}

impl PortError {
    /// Create a PortUnavailable error from a port name.
    pub fn unavailable(port_name: impl Into<String>) -> Self {
        Self::PortUnavailable(port_name.into())
    }

    /// Create an InvalidParameter error from a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Classify this error.
    pub fn kind(&self) -> PortErrorKind {
        match self {
            Self::PortUnavailable(_) => PortErrorKind::PortUnavailable,
            Self::InvalidParameter(_) => PortErrorKind::InvalidParameter,
            Self::PermissionDenied(_) => PortErrorKind::PermissionDenied,
            Self::ReadFailure(_) => PortErrorKind::ReadFailure,
            Self::ShortWrite { .. } => PortErrorKind::ShortWrite,
            Self::Encoding(_) => PortErrorKind::EncodingError,
            Self::Timeout(_) => PortErrorKind::Timeout,
            Self::AlreadyClosed => PortErrorKind::AlreadyClosed,
            Self::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => PortErrorKind::Timeout,
            Self::Io(_) | Self::Serial(_) => PortErrorKind::Other,
        }
    }

    /// Whether this error only means "nothing arrived before the driver timeout".
    pub fn is_no_data(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Map a failure to open `port_name` onto the open-time error kinds.
    pub fn from_open(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::unavailable(port_name),
            serialport::ErrorKind::InvalidInput => Self::invalid_parameter(err.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                Self::PermissionDenied(port_name.to_string())
            }
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                Self::unavailable(port_name)
            }
            _ => Self::PortUnavailable(format!("{port_name}: {err}")),
        }
    }
}

/// Result type for port operations.
pub type PortResult<T> = Result<T, PortError>;
