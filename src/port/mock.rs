//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial port behavior without
//! requiring actual hardware. Supports configurable read/write queues,
//! expectation verification, fault injection and instrumentation of
//! concurrent access.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Inner state of the mock port, shared by every clone of the mock.
#[derive(Debug, Default)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    /// Expected write operations (for verification).
    expected_writes: VecDeque<Vec<u8>>,
    /// Messages for reads that should fail, oldest first.
    read_failures: VecDeque<String>,
    /// Whether the next operation should time out.
    should_timeout: bool,
    /// Last timeout applied by the caller.
    timeout: Duration,
    /// Whether buffers have been cleared.
    buffers_cleared: bool,
    /// Written bytes are appended to the read queue.
    echo: bool,
    /// Total bytes the device accepts before refusing further writes.
    write_capacity: Option<usize>,
    /// Line-control calls fail when set.
    fail_line_control: bool,
    rts: Option<bool>,
    dtr: Option<bool>,
    /// Simulated transfer time of each read or write.
    op_delay: Duration,
    active_reads: usize,
    active_writes: usize,
    max_active: usize,
    overlap_observed: bool,
    clones: usize,
    released: bool,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Read,
    Write,
}

/// Mock serial port implementation for testing.
///
/// This implementation allows you to:
/// - Enqueue data to be returned by read operations
/// - Inspect what data was written
/// - Set expectations for write operations
/// - Simulate timeouts, read failures, short writes and line-control faults
/// - Observe whether reads and writes ever ran at the same time
///
/// Clones share state, so a test can keep one clone for inspection after
/// handing another to the code under test.
///
/// # Example
/// ```
/// use serial_mqtt_adapter::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
///
/// // Enqueue data to be read
/// port.enqueue_read(b"Hello, World!");
///
/// // Perform a read
/// let mut buffer = [0u8; 13];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(n, 13);
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// // Write some data
/// port.write_bytes(b"Response").unwrap();
///
/// // Verify what was written
/// let writes = port.get_write_log();
/// assert_eq!(writes.len(), 1);
/// assert_eq!(writes[0], b"Response");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// The internal state, shared between clones.
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Expect a specific write operation.
    ///
    /// Use `verify_expectations()` to check that all expected writes occurred.
    pub fn expect_write(&mut self, data: &[u8]) {
        self.state.lock().expected_writes.push_back(data.to_vec());
    }

    /// Verify that all expected writes have occurred in order.
    pub fn verify_expectations(&self) -> Result<(), String> {
        let state = self.state.lock();

        if !state.expected_writes.is_empty() {
            return Err(format!(
                "Expected {} more write(s), but none occurred",
                state.expected_writes.len()
            ));
        }

        Ok(())
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Total number of bytes written across all writes.
    pub fn bytes_written(&self) -> usize {
        self.state.lock().write_log.iter().map(Vec::len).sum()
    }

    /// Set whether the next read/write operation should time out.
    pub fn set_should_timeout(&mut self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Make the next read fail with an I/O error carrying `message`.
    pub fn fail_next_read(&mut self, message: impl Into<String>) {
        self.state.lock().read_failures.push_back(message.into());
    }

    /// Loop written bytes back into the read queue, like a TX-RX jumper.
    pub fn set_echo(&mut self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// Limit how many bytes the device accepts in total.
    pub fn set_write_capacity(&mut self, capacity: Option<usize>) {
        self.state.lock().write_capacity = capacity;
    }

    /// Make RTS/DTR calls fail.
    pub fn set_fail_line_control(&mut self, fail: bool) {
        self.state.lock().fail_line_control = fail;
    }

    /// Make every read and write take `delay` to complete.
    pub fn set_op_delay(&mut self, delay: Duration) {
        self.state.lock().op_delay = delay;
    }

    /// Get whether buffers have been cleared since the last reset.
    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// The last timeout applied to the port.
    pub fn last_timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    /// Last level driven on RTS, if any.
    pub fn rts_level(&self) -> Option<bool> {
        self.state.lock().rts
    }

    /// Last level driven on DTR, if any.
    pub fn dtr_level(&self) -> Option<bool> {
        self.state.lock().dtr
    }

    /// Largest number of reads and writes that were in progress at once.
    pub fn max_concurrent_ops(&self) -> usize {
        self.state.lock().max_active
    }

    /// Whether a read and a write were ever in progress at the same time.
    pub fn overlap_observed(&self) -> bool {
        self.state.lock().overlap_observed
    }

    /// Number of extra handles opened with `try_clone_adapter`.
    pub fn clone_count(&self) -> usize {
        self.state.lock().clones
    }

    /// Whether the device has been released.
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    fn enter(&self, op: Op) -> Duration {
        let mut state = self.state.lock();
        match op {
            Op::Read => state.active_reads += 1,
            Op::Write => state.active_writes += 1,
        }
        let active = state.active_reads + state.active_writes;
        state.max_active = state.max_active.max(active);
        if state.active_reads > 0 && state.active_writes > 0 {
            state.overlap_observed = true;
        }
        state.op_delay
    }

    fn leave(&self, op: Op) {
        let mut state = self.state.lock();
        match op {
            Op::Read => state.active_reads -= 1,
            Op::Write => state.active_writes -= 1,
        }
    }

    fn released_error() -> PortError {
        PortError::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "mock port released",
        ))
    }

    fn do_write(&self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.released {
            return Err(Self::released_error());
        }

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        if let Some(expected) = state.expected_writes.pop_front() {
            if expected != data {
                return Err(PortError::invalid_parameter(format!(
                    "Expected write: {:?}, got: {:?}",
                    expected, data
                )));
            }
        }

        let accepted = match state.write_capacity {
            Some(capacity) => {
                let used: usize = state.write_log.iter().map(Vec::len).sum();
                data.len().min(capacity.saturating_sub(used))
            }
            None => data.len(),
        };
        if accepted == 0 {
            return Ok(0);
        }

        let chunk = data[..accepted].to_vec();
        if state.echo {
            state.read_queue.extend(chunk.iter().copied());
        }
        state.write_log.push(chunk);

        Ok(accepted)
    }

    fn do_read(&self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.released {
            return Err(Self::released_error());
        }

        if let Some(message) = state.read_failures.pop_front() {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                message,
            )));
        }

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued_byte) => {
                    *byte = queued_byte;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // Simulate "would block" behavior by returning an I/O error
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn drive_line(&self, line: &str, level: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.fail_line_control {
            return Err(PortError::Io(std::io::Error::other(format!(
                "{line} not supported by mock"
            ))));
        }
        match line {
            "RTS" => state.rts = Some(level),
            _ => state.dtr = Some(level),
        }
        Ok(())
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let delay = self.enter(Op::Write);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = self.do_write(data);
        self.leave(Op::Write);
        result
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let delay = self.enter(Op::Read);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = self.do_read(buffer);
        self.leave(Op::Read);
        result
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.buffers_cleared = true;
        Ok(())
    }

    fn write_request_to_send(&mut self, level: bool) -> Result<(), PortError> {
        self.drive_line("RTS", level)
    }

    fn write_data_terminal_ready(&mut self, level: bool) -> Result<(), PortError> {
        self.drive_line("DTR", level)
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        self.state.lock().clones += 1;
        Ok(Box::new(self.clone()))
    }

    fn release(&mut self) {
        self.state.lock().released = true;
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.state.lock().read_queue.len())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
