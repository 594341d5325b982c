//! The open serial transport.
//!
//! A [`PortHandle`] owns one configured device. Reads drain whatever the
//! device has buffered and return it hex-encoded; writes take a hex string,
//! decode it, and push every byte out or report how far they got.
//!
//! Handle methods block. Async callers go through
//! [`DuplexCoordinator`](super::DuplexCoordinator), which runs them on the
//! blocking pool.

use super::error::{PortError, PortResult};
use super::line::{self, LinePlan};
use super::sync_port::SyncSerialPort;
use super::traits::SerialPortAdapter;
use crate::config::PortSettings;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Size of each driver read while draining.
const READ_CHUNK: usize = 2048;

/// Upper bound on one drain, so a device that never goes quiet cannot hold
/// the read side forever.
const MAX_DRAIN: usize = 64 * 1024;

/// Transfer direction of a port operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// Which deadline(s) a [`PortHandle::set_deadline`] call replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    Read,
    Write,
    Both,
}

impl From<Direction> for DeadlineKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Read => Self::Read,
            Direction::Write => Self::Write,
        }
    }
}

/// Result of one drain of the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Lowercase hex of the received bytes, empty when nothing arrived.
    pub payload: String,
    pub bytes_read: usize,
    /// `false` when the drain stopped at its size bound with data still pending.
    pub eof: bool,
}

impl ReadOutcome {
    pub fn is_empty(&self) -> bool {
        self.bytes_read == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    expires_at: Instant,
    duration: Duration,
}

impl Deadline {
    fn starting_now(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
            duration,
        }
    }

    /// Time left, or `None` once expired.
    fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }
}

/// An open, configured serial device.
#[derive(Debug)]
pub struct PortHandle {
    adapter: Option<Box<dyn SerialPortAdapter>>,
    settings: Arc<PortSettings>,
    read_deadline: Option<Deadline>,
    write_deadline: Option<Deadline>,
}

impl PortHandle {
    /// Open and configure the device described by `settings`.
    pub fn open(settings: PortSettings) -> PortResult<Self> {
        let plan = LinePlan::resolve(&settings)?;
        let port = SyncSerialPort::open(&settings, &plan)?;
        Self::attach(Box::new(port), settings)
    }

    /// Take ownership of an already opened adapter and apply the remaining
    /// line settings. On failure the adapter is released before returning.
    pub fn attach(
        mut adapter: Box<dyn SerialPortAdapter>,
        settings: PortSettings,
    ) -> PortResult<Self> {
        let configured = LinePlan::resolve(&settings)
            .and_then(|_| line::apply_output_lines(adapter.as_mut(), &settings))
            .and_then(|_| adapter.set_timeout(settings.poll_timeout));
        if let Err(e) = configured {
            warn!(port = %settings.port_name, error = %e, "port configuration failed");
            adapter.release();
            return Err(e);
        }

        info!(port = %settings, "serial port opened");
        Ok(Self {
            adapter: Some(adapter),
            settings: Arc::new(settings),
            read_deadline: None,
            write_deadline: None,
        })
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.port_name
    }

    pub fn is_open(&self) -> bool {
        self.adapter.is_some()
    }

    fn adapter(&mut self) -> PortResult<&mut Box<dyn SerialPortAdapter>> {
        self.adapter.as_mut().ok_or(PortError::AlreadyClosed)
    }

    /// Release the device. A second call fails with `AlreadyClosed`.
    pub fn close(&mut self) -> PortResult<()> {
        let mut adapter = self.adapter.take().ok_or(PortError::AlreadyClosed)?;
        adapter.release();
        info!(port = %self.settings.port_name, "serial port closed");
        Ok(())
    }

    /// Discard anything pending in the device's input and output buffers.
    pub fn flush(&mut self) -> PortResult<()> {
        self.adapter()?.clear_buffers()?;
        debug!(port = %self.settings.port_name, "buffers flushed");
        Ok(())
    }

    /// Bound subsequent operations to complete within `duration` from now.
    pub fn set_deadline(&mut self, kind: DeadlineKind, duration: Duration) -> PortResult<()> {
        self.adapter()?;
        let deadline = Some(Deadline::starting_now(duration));
        match kind {
            DeadlineKind::Read => self.read_deadline = deadline,
            DeadlineKind::Write => self.write_deadline = deadline,
            DeadlineKind::Both => {
                self.read_deadline = deadline;
                self.write_deadline = deadline;
            }
        }
        Ok(())
    }

    /// Remove any deadline of the given kind.
    pub fn clear_deadline(&mut self, kind: DeadlineKind) {
        match kind {
            DeadlineKind::Read => self.read_deadline = None,
            DeadlineKind::Write => self.write_deadline = None,
            DeadlineKind::Both => {
                self.read_deadline = None;
                self.write_deadline = None;
            }
        }
    }

    /// Restart the configured deadline for `direction` from now.
    pub fn arm_deadline(&mut self, direction: Direction) -> PortResult<()> {
        match self.settings.deadline_for(direction) {
            Some(duration) => self.set_deadline(direction.into(), duration),
            None => {
                self.clear_deadline(direction.into());
                Ok(())
            }
        }
    }

    /// Drain the receive buffer.
    ///
    /// Keeps reading until the driver reports no more data within the poll
    /// timeout, the device reports an empty queue, or the read deadline
    /// passes. An empty outcome is not an error.
    pub fn read(&mut self) -> PortResult<ReadOutcome> {
        let poll = self.settings.poll_timeout;
        let deadline = self.read_deadline;
        if let Some(d) = deadline {
            if d.remaining().is_none() {
                return Err(PortError::timeout(d.duration));
            }
        }

        let adapter = self.adapter()?;
        let mut collected = Vec::new();
        let mut buffer = [0u8; READ_CHUNK];
        let mut eof = true;

        loop {
            if collected.len() >= MAX_DRAIN {
                eof = false;
                break;
            }
            let timeout = match deadline {
                Some(d) => match d.remaining() {
                    Some(left) => left.min(poll),
                    None => break,
                },
                None => poll,
            };
            adapter
                .set_timeout(timeout)
                .map_err(|e| PortError::ReadFailure(e.to_string()))?;

            match adapter.read_bytes(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    trace!(bytes = n, "chunk received");
                    collected.extend_from_slice(&buffer[..n]);
                    if adapter.bytes_to_read() == Some(0) {
                        break;
                    }
                }
                Err(e) if e.is_no_data() => break,
                Err(e) => return Err(PortError::ReadFailure(e.to_string())),
            }
        }

        Ok(ReadOutcome {
            payload: hex::encode(&collected),
            bytes_read: collected.len(),
            eof,
        })
    }

    /// Decode `payload` as hex and write it. Nothing is sent if decoding fails.
    pub fn write_hex(&mut self, payload: &str) -> PortResult<usize> {
        let data = hex::decode(payload.trim())?;
        self.write(&data)
    }

    /// Write all of `data`, returning the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> PortResult<usize> {
        let poll = self.settings.poll_timeout;
        let deadline = self.write_deadline;
        if let Some(d) = deadline {
            if d.remaining().is_none() {
                return Err(PortError::timeout(d.duration));
            }
        }

        let adapter = self.adapter()?;
        let mut written = 0;
        let mut timed_out = None;

        while written < data.len() {
            let timeout = match deadline {
                Some(d) => match d.remaining() {
                    Some(left) => left.min(poll),
                    None => {
                        timed_out = Some(d.duration);
                        break;
                    }
                },
                None => poll,
            };
            adapter.set_timeout(timeout)?;

            match adapter.write_bytes(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.is_no_data() => {
                    timed_out = Some(timeout);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if written == data.len() {
            trace!(bytes = written, "payload written");
            return Ok(written);
        }
        match timed_out {
            Some(after) if written == 0 => Err(PortError::timeout(after)),
            _ => Err(PortError::ShortWrite {
                written,
                expected: data.len(),
            }),
        }
    }

    /// Open a second handle on the same device for independent use from
    /// another thread. Deadlines are not shared.
    pub fn try_split(&self) -> PortResult<PortHandle> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or(PortError::AlreadyClosed)?
            .try_clone_adapter()?;
        Ok(Self {
            adapter: Some(adapter),
            settings: Arc::clone(&self.settings),
            read_deadline: None,
            write_deadline: None,
        })
    }
}

impl Drop for PortHandle {
    fn drop(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            debug!(port = %self.settings.port_name, "releasing port on drop");
            adapter.release();
        }
    }
}
