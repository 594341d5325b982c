//! Service layer of the bridge.
//!
//! Everything that moves data between the bus and the port goes through a
//! [`BridgeService`], a cheap-to-clone context holding the coordinator, the
//! publisher and the topic root. The read loop and the request router both
//! drive it; neither touches the port directly.
//!
//! # Architecture
//!
//! ```text
//! <root>/read  ─┐                                   ┌─> <root>/response
//!               ├─> RequestRouter ─┐                │
//! <root>/write ─┘                  ├─> BridgeService ┤
//!                       ReadLoop ──┘        │        └─> <root>/error
//!                                           v
//!                                  DuplexCoordinator ──> PortHandle
//! ```

pub mod read_loop;
pub mod router;

pub use read_loop::ReadLoop;
pub use router::{Request, RequestRouter};

use crate::bus::Publisher;
use crate::port::DuplexCoordinator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Topic suffix for data read from the device.
pub const RESPONSE_SUFFIX: &str = "response";

/// Topic suffix for failed operations.
pub const ERROR_SUFFIX: &str = "error";

// ========== Events ==========

/// The port operation an error event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Something the bridge publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    /// Hex-encoded bytes read from the device.
    Response(String),
    /// A failed read or write.
    Error { operation: Operation, message: String },
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    operation: Operation,
    error: &'a str,
}

impl IoEvent {
    /// Topic this event is published on.
    pub fn topic(&self, topic_root: &str) -> String {
        let suffix = match self {
            Self::Response(_) => RESPONSE_SUFFIX,
            Self::Error { .. } => ERROR_SUFFIX,
        };
        format!("{topic_root}/{suffix}")
    }

    /// Wire payload: the hex text with backslashes escaped for responses, a
    /// JSON object for errors.
    pub fn payload(&self) -> String {
        match self {
            Self::Response(hex) => hex.replace('\\', "\\\\"),
            Self::Error { operation, message } => serde_json::to_string(&ErrorPayload {
                operation: *operation,
                error: message,
            })
            .unwrap_or_else(|_| format!(r#"{{"operation":"{}","error":""}}"#, operation.as_str())),
        }
    }
}

// ========== Service ==========

/// Shared context for every bridge operation.
#[derive(Clone)]
pub struct BridgeService {
    coordinator: Arc<DuplexCoordinator>,
    publisher: Arc<dyn Publisher>,
    topic_root: Arc<str>,
}

impl BridgeService {
    pub fn new(
        coordinator: Arc<DuplexCoordinator>,
        publisher: Arc<dyn Publisher>,
        topic_root: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            publisher,
            topic_root: Arc::from(topic_root.into()),
        }
    }

    pub fn coordinator(&self) -> &Arc<DuplexCoordinator> {
        &self.coordinator
    }

    pub fn topic_root(&self) -> &str {
        &self.topic_root
    }

    /// Perform one read and publish its outcome.
    ///
    /// Returns the event that was published, or `None` when nothing arrived.
    pub async fn read_once(&self) -> Option<IoEvent> {
        let event = match self.coordinator.read().await {
            Ok(outcome) if outcome.is_empty() => return None,
            Ok(outcome) => {
                info!(bytes = outcome.bytes_read, "data read from port");
                IoEvent::Response(outcome.payload)
            }
            Err(e) => {
                error!(error = %e, "read failed");
                IoEvent::Error {
                    operation: Operation::Read,
                    message: e.to_string(),
                }
            }
        };
        self.emit(&event).await;
        Some(event)
    }

    /// Write one hex payload. Only failures are published.
    pub async fn write_once(&self, payload: &str) -> Option<IoEvent> {
        match self.coordinator.write_hex(payload).await {
            Ok(written) => {
                debug!(bytes = written, "payload written to port");
                None
            }
            Err(e) => {
                error!(error = %e, "write failed");
                let event = IoEvent::Error {
                    operation: Operation::Write,
                    message: e.to_string(),
                };
                self.emit(&event).await;
                Some(event)
            }
        }
    }

    /// Publish `event`. Failures are logged, never returned.
    pub async fn emit(&self, event: &IoEvent) {
        let topic = event.topic(&self.topic_root);
        if let Err(e) = self.publisher.publish(&topic, event.payload()).await {
            error!(%topic, error = %e, "publish failed");
        }
    }
}

impl std::fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeService")
            .field("mode", &self.coordinator.mode())
            .field("topic_root", &self.topic_root)
            .finish()
    }
}
