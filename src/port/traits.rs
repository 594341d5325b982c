//! Core traits for serial port abstraction.
//!
//! Defines the `SerialPortAdapter` trait that allows both real serial ports
//! and mock implementations to be used interchangeably, plus the coded line
//! settings that adapter settings are validated into.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A line setting that adapter settings express as a small integer code.
pub trait SettingCode: Sized + Copy {
    /// Every integer code accepted for this setting.
    const CODES: &'static [i64];

    /// Decode `code`, returning `None` when it is outside [`Self::CODES`].
    fn from_code(code: i64) -> Option<Self>;
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl SettingCode for DataBits {
    const CODES: &'static [i64] = &[5, 6, 7, 8];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            5 => Some(Self::Five),
            6 => Some(Self::Six),
            7 => Some(Self::Seven),
            8 => Some(Self::Eight),
            _ => None,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl SettingCode for StopBits {
    const CODES: &'static [i64] = &[1, 2];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Parity checking modes.
///
/// Codes `0` and `1` both select no parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl SettingCode for Parity {
    const CODES: &'static [i64] = &[0, 1, 2, 3, 4, 5];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 | 1 => Some(Self::None),
            2 => Some(Self::Odd),
            3 => Some(Self::Even),
            4 => Some(Self::Mark),
            5 => Some(Self::Space),
            _ => None,
        }
    }
}

/// Flow control modes.
///
/// Codes `0` and `1` both disable flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    XonXoff,
    RtsCts,
    DtrDsr,
}

impl SettingCode for FlowControl {
    const CODES: &'static [i64] = &[0, 1, 2, 3, 4];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 | 1 => Some(Self::None),
            2 => Some(Self::XonXoff),
            3 => Some(Self::RtsCts),
            4 => Some(Self::DtrDsr),
            _ => None,
        }
    }
}

/// Behaviour of an output control line (RTS or DTR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputLine {
    /// Leave the line as the driver configured it.
    #[default]
    Untouched,
    Off,
    On,
    FlowControl,
}

impl SettingCode for OutputLine {
    const CODES: &'static [i64] = &[0, 1, 2, 3];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Untouched),
            1 => Some(Self::Off),
            2 => Some(Self::On),
            3 => Some(Self::FlowControl),
            _ => None,
        }
    }
}

/// Behaviour of an input control line (CTS or DSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputLine {
    #[default]
    Untouched,
    Ignore,
    FlowControl,
}

impl SettingCode for InputLine {
    const CODES: &'static [i64] = &[0, 1, 2];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Untouched),
            1 => Some(Self::Ignore),
            2 => Some(Self::FlowControl),
            _ => None,
        }
    }
}

/// Software (XON/XOFF) flow control direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum XonXoff {
    #[default]
    Untouched,
    Disabled,
    Inbound,
    Outbound,
    Both,
}

impl SettingCode for XonXoff {
    const CODES: &'static [i64] = &[0, 1, 2, 3, 4];

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Untouched),
            1 => Some(Self::Disabled),
            2 => Some(Self::Inbound),
            3 => Some(Self::Outbound),
            4 => Some(Self::Both),
            _ => None,
        }
    }
}

/// Trait for serial port I/O operations.
///
/// This trait abstracts over synchronous serial port operations, allowing both
/// real hardware ports and mock implementations for testing.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Clear both input and output buffers.
    ///
    /// This discards any unread data in the receive buffer and any unsent
    /// data in the transmit buffer.
    fn clear_buffers(&mut self) -> Result<(), PortError>;

    /// Drive the RTS output line.
    fn write_request_to_send(&mut self, level: bool) -> Result<(), PortError>;

    /// Drive the DTR output line.
    fn write_data_terminal_ready(&mut self, level: bool) -> Result<(), PortError>;

    /// Open a second handle onto the same device.
    ///
    /// Used to give reads and writes independent handles on full-duplex links.
    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError>;

    /// Release the device. The adapter must not be used afterwards.
    fn release(&mut self) {}

    /// Get the current bytes available to read (if supported).
    ///
    /// Returns `None` if the operation is not supported or cannot be determined.
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_bits_codes() {
        for code in DataBits::CODES {
            assert!(DataBits::from_code(*code).is_some());
        }
        assert_eq!(DataBits::from_code(9), None);
        assert_eq!(DataBits::from_code(0), None);
    }

    #[test]
    fn test_parity_zero_and_one_mean_none() {
        assert_eq!(Parity::from_code(0), Some(Parity::None));
        assert_eq!(Parity::from_code(1), Some(Parity::None));
        assert_eq!(Parity::from_code(5), Some(Parity::Space));
        assert_eq!(Parity::from_code(6), None);
    }

    #[test]
    fn test_flow_control_codes() {
        assert_eq!(FlowControl::from_code(2), Some(FlowControl::XonXoff));
        assert_eq!(FlowControl::from_code(3), Some(FlowControl::RtsCts));
        assert_eq!(FlowControl::from_code(-1), None);
    }

    #[test]
    fn test_line_defaults_are_untouched() {
        assert_eq!(OutputLine::default(), OutputLine::Untouched);
        assert_eq!(InputLine::default(), InputLine::Untouched);
        assert_eq!(XonXoff::default(), XonXoff::Untouched);
    }

    #[test]
    fn test_data_bits_conversion() {
        let serialport_bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(serialport_bits, serialport::DataBits::Seven);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let serialport_stop_bits: serialport::StopBits = StopBits::Two.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }
}
