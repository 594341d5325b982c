//! Mapping validated line settings onto what the serial driver can do.
//!
//! The adapter settings can describe more than the `serialport` driver
//! supports (mark/space parity, DTR/DSR handshaking, one-way XON/XOFF) and
//! can combine options that contradict each other. Everything is checked here
//! before the device is touched.

use super::error::{PortError, PortResult};
use super::traits::{FlowControl, InputLine, OutputLine, Parity, SerialPortAdapter, XonXoff};
use crate::config::PortSettings;
use tracing::debug;

/// Driver-level parity and flow control derived from [`PortSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePlan {
    pub parity: serialport::Parity,
    pub flow_control: serialport::FlowControl,
}

impl LinePlan {
    /// Resolve the driver configuration for `settings`.
    pub fn resolve(settings: &PortSettings) -> PortResult<Self> {
        let parity = match settings.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            Parity::Mark | Parity::Space => {
                return Err(PortError::invalid_parameter(
                    "mark/space parity is not supported by the serial driver",
                ))
            }
        };

        let mut flow_control = match settings.flow_control {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::XonXoff => serialport::FlowControl::Software,
            FlowControl::RtsCts => serialport::FlowControl::Hardware,
            FlowControl::DtrDsr => return Err(dtr_dsr_unsupported()),
        };

        if settings.dtr == OutputLine::FlowControl || settings.dsr == InputLine::FlowControl {
            return Err(dtr_dsr_unsupported());
        }

        if settings.rts == OutputLine::FlowControl || settings.cts == InputLine::FlowControl {
            flow_control = require(
                flow_control,
                serialport::FlowControl::Hardware,
                "RTS/CTS flow control",
            )?;
        }

        match settings.xon_xoff {
            XonXoff::Untouched => {}
            XonXoff::Disabled if flow_control == serialport::FlowControl::Software => {
                return Err(PortError::invalid_parameter(
                    "xonXoff is disabled but flowControl selects XON/XOFF",
                ))
            }
            XonXoff::Disabled => {}
            XonXoff::Inbound | XonXoff::Outbound => {
                return Err(PortError::invalid_parameter(
                    "one-way XON/XOFF is not supported by the serial driver",
                ))
            }
            XonXoff::Both => {
                flow_control =
                    require(flow_control, serialport::FlowControl::Software, "XON/XOFF")?;
            }
        }

        Ok(Self {
            parity,
            flow_control,
        })
    }
}

fn dtr_dsr_unsupported() -> PortError {
    PortError::invalid_parameter("DTR/DSR flow control is not supported by the serial driver")
}

fn require(
    current: serialport::FlowControl,
    wanted: serialport::FlowControl,
    what: &str,
) -> PortResult<serialport::FlowControl> {
    if current == serialport::FlowControl::None || current == wanted {
        Ok(wanted)
    } else {
        Err(PortError::invalid_parameter(format!(
            "{what} conflicts with flowControl ({current:?})"
        )))
    }
}

/// Drive RTS and DTR to the levels requested by `settings`.
pub fn apply_output_lines(
    adapter: &mut dyn SerialPortAdapter,
    settings: &PortSettings,
) -> PortResult<()> {
    if let Some(level) = fixed_level(settings.rts) {
        adapter
            .write_request_to_send(level)
            .map_err(|e| PortError::invalid_parameter(format!("failed to drive RTS: {e}")))?;
        debug!(level, "RTS asserted");
    }
    if let Some(level) = fixed_level(settings.dtr) {
        adapter
            .write_data_terminal_ready(level)
            .map_err(|e| PortError::invalid_parameter(format!("failed to drive DTR: {e}")))?;
        debug!(level, "DTR asserted");
    }
    Ok(())
}

fn fixed_level(line: OutputLine) -> Option<bool> {
    match line {
        OutputLine::Off => Some(false),
        OutputLine::On => Some(true),
        OutputLine::Untouched | OutputLine::FlowControl => None,
    }
}
