//! Adapter settings validation.
//!
//! The settings loader hands over a loosely typed JSON map. [`validate`] turns
//! it into a [`PortSettings`] record, or names the first field that is
//! missing or outside its domain.

use super::error::{ConfigError, ConfigResult};
use crate::port::{
    DataBits, Direction, FlowControl, InputLine, OutputLine, Parity, SettingCode, StopBits,
    XonXoff,
};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw adapter settings as parsed from JSON.
pub type RawSettings = Map<String, Value>;

/// Bit rates a port may be opened with.
pub const BIT_RATES: &[u32] = &[
    110, 300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 128000, 256000,
];

/// Per-call driver timeout used while draining when no deadline is tighter.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Recognised setting keys.
pub mod keys {
    pub const PORT_NAME: &str = "portName";
    pub const BIT_RATE: &str = "bitRate";
    pub const DATA_BITS: &str = "dataBits";
    pub const STOP_BITS: &str = "stopBits";
    pub const PARITY: &str = "parity";
    pub const FLOW_CONTROL: &str = "flowControl";
    pub const RTS: &str = "rts";
    pub const CTS: &str = "cts";
    pub const DSR: &str = "dsr";
    pub const DTR: &str = "dtr";
    pub const XON_XOFF: &str = "xonXoff";
    pub const DEADLINE: &str = "deadline";
    pub const READ_DEADLINE: &str = "readDeadline";
    pub const WRITE_DEADLINE: &str = "writeDeadline";
    pub const HALF_DUPLEX: &str = "halfDuplex";
}

/// Older deployments spell the line-control keys out in full.
const ALIASES: &[(&str, &str)] = &[
    (keys::RTS, "requestToSend"),
    (keys::CTS, "clearToSend"),
    (keys::DSR, "dataSetReady"),
    (keys::DTR, "dataTerminalReady"),
    (keys::XON_XOFF, "xONxOFF"),
];

/// Validated, immutable serial port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub port_name: String,
    pub bit_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub rts: OutputLine,
    pub cts: InputLine,
    pub dsr: InputLine,
    pub dtr: OutputLine,
    pub xon_xoff: XonXoff,
    /// Combined deadline. `None` when absent or zero.
    pub deadline: Option<Duration>,
    /// Whether the combined `deadline` key was given at all. A present key
    /// overrides the split deadlines even when its value is zero.
    pub combined_deadline: bool,
    pub read_deadline: Option<Duration>,
    pub write_deadline: Option<Duration>,
    pub half_duplex: bool,
    pub poll_timeout: Duration,
}

impl PortSettings {
    /// Settings for `port_name` at `bit_rate`, 8-N-1, no flow control.
    pub fn new(port_name: impl Into<String>, bit_rate: u32) -> ConfigResult<Self> {
        let port_name = port_name.into();
        if port_name.trim().is_empty() {
            return Err(ConfigError::setting(keys::PORT_NAME, "must not be empty"));
        }
        check_bit_rate(bit_rate)?;

        Ok(Self {
            port_name,
            bit_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            rts: OutputLine::Untouched,
            cts: InputLine::Untouched,
            dsr: InputLine::Untouched,
            dtr: OutputLine::Untouched,
            xon_xoff: XonXoff::Untouched,
            deadline: None,
            combined_deadline: false,
            read_deadline: None,
            write_deadline: None,
            half_duplex: false,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        })
    }

    /// Replace the per-call driver timeout used while draining.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Switch the link between half- and full-duplex access.
    pub fn with_half_duplex(mut self, half_duplex: bool) -> Self {
        self.half_duplex = half_duplex;
        self
    }

    /// The deadline that bounds each operation in `direction`, if any.
    pub fn deadline_for(&self, direction: Direction) -> Option<Duration> {
        if self.combined_deadline {
            return self.deadline;
        }
        match direction {
            Direction::Read => self.read_deadline,
            Direction::Write => self.write_deadline,
        }
    }
}

impl fmt::Display for PortSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_bits = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        let stop_bits = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(
            f,
            "{} @ {} {}-{}-{}",
            self.port_name, self.bit_rate, data_bits, parity, stop_bits
        )
    }
}

/// Validate a raw settings map into [`PortSettings`].
///
/// `null` values are treated as absent. Unrecognised keys are ignored, since
/// the same map may carry settings for other parts of the adapter.
pub fn validate(raw: &RawSettings) -> ConfigResult<PortSettings> {
    let port_name = match lookup(raw, keys::PORT_NAME)? {
        None => return Err(ConfigError::missing(keys::PORT_NAME)),
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(ConfigError::setting(
                keys::PORT_NAME,
                format!("expected a string, got {other}"),
            ))
        }
    };

    let bit_rate = integer(raw, keys::BIT_RATE)?
        .ok_or_else(|| ConfigError::missing(keys::BIT_RATE))?;
    let bit_rate = u32::try_from(bit_rate).map_err(|_| {
        ConfigError::setting(
            keys::BIT_RATE,
            format!("{bit_rate} is not a supported bit rate"),
        )
    })?;

    let mut settings = PortSettings::new(port_name, bit_rate)?;

    settings.data_bits = coded(raw, keys::DATA_BITS, settings.data_bits)?;
    settings.stop_bits = coded(raw, keys::STOP_BITS, settings.stop_bits)?;
    settings.parity = coded(raw, keys::PARITY, settings.parity)?;
    settings.flow_control = coded(raw, keys::FLOW_CONTROL, settings.flow_control)?;
    settings.rts = coded(raw, keys::RTS, settings.rts)?;
    settings.cts = coded(raw, keys::CTS, settings.cts)?;
    settings.dsr = coded(raw, keys::DSR, settings.dsr)?;
    settings.dtr = coded(raw, keys::DTR, settings.dtr)?;
    settings.xon_xoff = coded(raw, keys::XON_XOFF, settings.xon_xoff)?;

    settings.combined_deadline = lookup(raw, keys::DEADLINE)?.is_some();
    settings.deadline = deadline(raw, keys::DEADLINE)?;
    settings.read_deadline = deadline(raw, keys::READ_DEADLINE)?;
    settings.write_deadline = deadline(raw, keys::WRITE_DEADLINE)?;
    let split_given = lookup(raw, keys::READ_DEADLINE)?.is_some()
        || lookup(raw, keys::WRITE_DEADLINE)?.is_some();
    if settings.combined_deadline && split_given {
        warn!(
            deadline = ?settings.deadline,
            read_deadline = ?settings.read_deadline,
            write_deadline = ?settings.write_deadline,
            "combined deadline overrides readDeadline/writeDeadline"
        );
    }

    settings.half_duplex = match lookup(raw, keys::HALF_DUPLEX)? {
        None => false,
        Some(Value::Bool(flag)) => *flag,
        Some(other) => {
            return Err(ConfigError::setting(
                keys::HALF_DUPLEX,
                format!("expected a boolean, got {other}"),
            ))
        }
    };

    debug!(
        settings = %settings,
        half_duplex = settings.half_duplex,
        "adapter settings validated"
    );
    Ok(settings)
}

fn check_bit_rate(bit_rate: u32) -> ConfigResult<()> {
    if BIT_RATES.contains(&bit_rate) {
        Ok(())
    } else {
        Err(ConfigError::setting(
            keys::BIT_RATE,
            format!("{bit_rate} is not a supported bit rate"),
        ))
    }
}

/// Find `field` (or its alias), skipping `null`.
///
/// A field given under both spellings must carry the same value.
fn lookup<'a>(raw: &'a RawSettings, field: &str) -> ConfigResult<Option<&'a Value>> {
    let present = |key: &str| raw.get(key).filter(|value| !value.is_null());
    let alias = ALIASES
        .iter()
        .find(|(canonical, _)| *canonical == field)
        .map(|(_, alias)| *alias);

    match (present(field), alias.and_then(|key| present(key).map(|v| (key, v)))) {
        (Some(value), Some((key, other))) if value != other => Err(ConfigError::setting(
            field,
            format!("{value} conflicts with {key} = {other}"),
        )),
        (Some(value), _) => Ok(Some(value)),
        (None, alias) => Ok(alias.map(|(_, value)| value)),
    }
}

fn integer(raw: &RawSettings, field: &str) -> ConfigResult<Option<i64>> {
    match lookup(raw, field)? {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
            ConfigError::setting(field, format!("expected an integer, got {n}"))
        }),
        Some(other) => Err(ConfigError::setting(
            field,
            format!("expected an integer, got {other}"),
        )),
    }
}

fn coded<T: SettingCode>(raw: &RawSettings, field: &str, default: T) -> ConfigResult<T> {
    match integer(raw, field)? {
        None => Ok(default),
        Some(code) => T::from_code(code).ok_or_else(|| {
            ConfigError::setting(field, format!("{code} is not one of {:?}", T::CODES))
        }),
    }
}

fn deadline(raw: &RawSettings, field: &str) -> ConfigResult<Option<Duration>> {
    match integer(raw, field)? {
        None | Some(0) => Ok(None),
        Some(ms) if ms < 0 => Err(ConfigError::setting(
            field,
            format!("{ms} must be a non-negative number of milliseconds"),
        )),
        Some(ms) => Ok(Some(Duration::from_millis(ms as u64))),
    }
}
