//! Background task that keeps the device's receive buffer drained.

use super::{BridgeService, IoEvent};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

/// Handle to a running read loop.
#[derive(Debug)]
pub struct ReadLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl ReadLoop {
    /// Start reading continuously through `service`.
    ///
    /// After a read that produced no data the loop waits `idle_backoff`
    /// (cut short by [`stop`](Self::stop)) before reading again.
    pub fn spawn(service: BridgeService, idle_backoff: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(service, stop_rx, idle_backoff));
        Self { stop_tx, handle }
    }

    /// Ask the loop to stop after the current iteration. Safe to call more
    /// than once.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit, returning the number of iterations it ran.
    pub async fn join(self) -> Result<u64, JoinError> {
        self.handle.await
    }

    /// Stop the loop and wait up to `grace` for it. The task is aborted if it
    /// does not exit in time.
    pub async fn shutdown(self, grace: Duration) -> Option<u64> {
        self.stop();
        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(iterations)) => Some(iterations),
            Ok(Err(e)) => {
                debug!(error = %e, "read loop task failed");
                None
            }
            Err(_) => {
                handle.abort();
                None
            }
        }
    }
}

fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    *stop_rx.borrow() || stop_rx.has_changed().is_err()
}

async fn run(
    service: BridgeService,
    mut stop_rx: watch::Receiver<bool>,
    idle_backoff: Duration,
) -> u64 {
    info!(topic_root = service.topic_root(), "read loop started");
    let mut iterations = 0u64;

    while !stop_requested(&stop_rx) {
        iterations += 1;
        let got_data = matches!(service.read_once().await, Some(IoEvent::Response(_)));

        if got_data || idle_backoff.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(idle_backoff) => {}
        }
    }

    info!(iterations, "read loop stopped");
    iterations
}
