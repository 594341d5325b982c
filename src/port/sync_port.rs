//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `SerialPortAdapter`
//! trait for dependency injection and testing.

use super::error::PortError;
use super::line::LinePlan;
use super::traits::SerialPortAdapter;
use crate::config::PortSettings;
use std::io::{Read, Write};
use std::time::Duration;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open the device named in `settings`.
    ///
    /// Bit rate, data bits, parity, stop bits, flow control and the initial
    /// timeout are handed to the driver together, so the device is either
    /// opened fully configured or not at all.
    ///
    /// # Example
    /// ```no_run
    /// use serial_mqtt_adapter::config::PortSettings;
    /// use serial_mqtt_adapter::port::{LinePlan, SyncSerialPort};
    ///
    /// let settings = PortSettings::new("/dev/ttyUSB0", 19200)?;
    /// let plan = LinePlan::resolve(&settings)?;
    /// let port = SyncSerialPort::open(&settings, &plan)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(settings: &PortSettings, plan: &LinePlan) -> Result<Self, PortError> {
        let port = serialport::new(&settings.port_name, settings.bit_rate)
            .data_bits(settings.data_bits.into())
            .flow_control(plan.flow_control)
            .parity(plan.parity)
            .stop_bits(settings.stop_bits.into())
            .timeout(settings.poll_timeout)
            .open()
            .map_err(|e| PortError::from_open(&settings.port_name, e))?;

        Ok(Self {
            port,
            name: settings.port_name.clone(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(PortError::Serial)
    }

    fn write_request_to_send(&mut self, level: bool) -> Result<(), PortError> {
        self.port
            .write_request_to_send(level)
            .map_err(PortError::Serial)
    }

    fn write_data_terminal_ready(&mut self, level: bool) -> Result<(), PortError> {
        self.port
            .write_data_terminal_ready(level)
            .map_err(PortError::Serial)
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let port = self.port.try_clone().map_err(PortError::Serial)?;
        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
        }))
    }

    fn bytes_to_read(&self) -> Option<usize> {
        self.port.bytes_to_read().ok().map(|n| n as usize)
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortErrorKind;

    #[test]
    fn test_port_not_found_error() {
        let settings = PortSettings::new("/dev/nonexistent_port_12345", 9600).unwrap();
        let plan = LinePlan::resolve(&settings).unwrap();

        match SyncSerialPort::open(&settings, &plan) {
            Ok(_) => panic!("nonexistent port opened"),
            Err(e) => assert_eq!(
                e.kind(),
                PortErrorKind::PortUnavailable,
                "unexpected error: {e:?}"
            ),
        }
    }
}
