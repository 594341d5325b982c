//! Serialized access to the port for async callers.
//!
//! In half-duplex mode one lock guards the handle, so a read and a write
//! never run at the same time. In full-duplex mode the handle is split and
//! each direction has its own lock: reads and writes may overlap, while two
//! operations in the same direction still queue.
//!
//! Every operation runs on the blocking pool while holding an
//! [`OwnedMutexGuard`]. The guard is moved into the blocking task and dropped
//! when the task finishes, on success, error or panic alike.

use super::error::{PortError, PortResult};
use super::handle::{Direction, PortHandle, ReadOutcome};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

/// How reads and writes share the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexMode {
    Full,
    Half,
}

impl DuplexMode {
    pub fn from_half_duplex(half_duplex: bool) -> Self {
        if half_duplex {
            Self::Half
        } else {
            Self::Full
        }
    }
}

/// Exclusive access to the port for one direction.
///
/// Dereferences to the [`PortHandle`]; dropping it releases the direction.
pub struct PortAccess {
    guard: OwnedMutexGuard<PortHandle>,
    direction: Direction,
}

impl PortAccess {
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Deref for PortAccess {
    type Target = PortHandle;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PortAccess {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for PortAccess {
    fn drop(&mut self) {
        trace!(direction = ?self.direction, "port access released");
    }
}

/// Arbitrates port access between the read loop and write requests.
#[derive(Debug)]
pub struct DuplexCoordinator {
    mode: DuplexMode,
    reader: Arc<Mutex<PortHandle>>,
    writer: Arc<Mutex<PortHandle>>,
}

impl DuplexCoordinator {
    /// Wrap `handle`. Full-duplex mode needs a second OS handle on the
    /// device and fails if the driver cannot provide one.
    pub fn new(handle: PortHandle, mode: DuplexMode) -> PortResult<Self> {
        let (reader, writer) = match mode {
            DuplexMode::Half => {
                let shared = Arc::new(Mutex::new(handle));
                (Arc::clone(&shared), shared)
            }
            DuplexMode::Full => {
                let write_half = handle.try_split()?;
                (Arc::new(Mutex::new(handle)), Arc::new(Mutex::new(write_half)))
            }
        };
        debug!(?mode, "duplex coordinator ready");
        Ok(Self {
            mode,
            reader,
            writer,
        })
    }

    pub fn mode(&self) -> DuplexMode {
        self.mode
    }

    /// Wait for exclusive access to the port in `direction`.
    pub async fn acquire(&self, direction: Direction) -> PortAccess {
        let lock = match direction {
            Direction::Read => &self.reader,
            Direction::Write => &self.writer,
        };
        let guard = Arc::clone(lock).lock_owned().await;
        trace!(?direction, "port access granted");
        PortAccess { guard, direction }
    }

    /// Drain the receive buffer under the read lock.
    pub async fn read(&self) -> PortResult<ReadOutcome> {
        let access = self.acquire(Direction::Read).await;
        run_blocking(access, |port| {
            port.arm_deadline(Direction::Read)?;
            port.read()
        })
        .await
    }

    /// Decode `payload` and write it under the write lock.
    ///
    /// Malformed payloads are rejected before the lock is requested.
    pub async fn write_hex(&self, payload: &str) -> PortResult<usize> {
        let data = hex::decode(payload.trim())?;
        let access = self.acquire(Direction::Write).await;
        run_blocking(access, move |port| {
            port.arm_deadline(Direction::Write)?;
            port.write(&data)
        })
        .await
    }

    /// Discard pending device buffers.
    pub async fn flush(&self) -> PortResult<()> {
        let access = self.acquire(Direction::Read).await;
        run_blocking(access, |port| port.flush()).await
    }

    /// Close the port. Both halves are closed in full-duplex mode; the
    /// first error is returned after both have been attempted.
    pub async fn close(&self) -> PortResult<()> {
        let read_side =
            run_blocking(self.acquire(Direction::Read).await, |port| port.close()).await;
        if self.mode == DuplexMode::Half {
            return read_side;
        }

        let write_side =
            run_blocking(self.acquire(Direction::Write).await, |port| port.close()).await;
        if let Err(e) = &write_side {
            warn!(error = %e, "closing write half failed");
        }
        read_side.and(write_side)
    }
}

async fn run_blocking<T, F>(mut access: PortAccess, op: F) -> PortResult<T>
where
    F: FnOnce(&mut PortHandle) -> PortResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = op(&mut *access);
        drop(access);
        result
    })
    .await
    .map_err(|e| PortError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortSettings;
    use crate::port::{MockSerialPort, PortErrorKind};
    use std::time::Duration;

    fn coordinator(mode: DuplexMode) -> (Arc<DuplexCoordinator>, MockSerialPort) {
        let mock = MockSerialPort::new("MOCK0");
        let settings = PortSettings::new("MOCK0", 9600)
            .unwrap()
            .with_poll_timeout(Duration::from_millis(10));
        let handle = PortHandle::attach(Box::new(mock.clone()), settings).unwrap();
        (Arc::new(DuplexCoordinator::new(handle, mode).unwrap()), mock)
    }

    async fn read_and_write_together(coordinator: &Arc<DuplexCoordinator>) {
        let mut tasks = Vec::new();
        for i in 0..4 {
            let c = Arc::clone(coordinator);
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    c.read().await.map(|_| ())
                } else {
                    c.write_hex("aa55").await.map(|_| ())
                }
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_half_duplex_never_overlaps() {
        let (coordinator, mut mock) = coordinator(DuplexMode::Half);
        mock.set_op_delay(Duration::from_millis(30));

        read_and_write_together(&coordinator).await;

        assert_eq!(mock.max_concurrent_ops(), 1);
        assert!(!mock.overlap_observed());
        assert_eq!(mock.bytes_written(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_duplex_allows_overlap() {
        let (coordinator, mut mock) = coordinator(DuplexMode::Full);
        mock.set_op_delay(Duration::from_millis(100));

        read_and_write_together(&coordinator).await;

        assert!(mock.overlap_observed());
        assert_eq!(mock.clone_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_hex_does_not_touch_port() {
        let (coordinator, mock) = coordinator(DuplexMode::Half);

        let err = coordinator.write_hex("not hex").await.unwrap_err();
        assert_eq!(err.kind(), PortErrorKind::EncodingError);
        assert_eq!(mock.bytes_written(), 0);
    }

    #[tokio::test]
    async fn test_access_released_after_error() {
        let (coordinator, mut mock) = coordinator(DuplexMode::Half);
        mock.fail_next_read("glitch");

        assert!(coordinator.read().await.is_err());
        // Lock must be free again.
        coordinator.write_hex("01").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_full_duplex_closes_both_halves() {
        let (coordinator, mock) = coordinator(DuplexMode::Full);

        coordinator.close().await.unwrap();
        assert!(mock.is_released());
        let err = coordinator.close().await.unwrap_err();
        assert_eq!(err.kind(), PortErrorKind::AlreadyClosed);
    }
}
