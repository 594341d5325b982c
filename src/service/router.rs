//! Dispatch of inbound bus messages.

use super::BridgeService;
use crate::bus::InboundMessage;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A request the bridge understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read,
    /// Hex text to send to the device.
    Write(String),
}

impl Request {
    /// Classify a message by its topic suffix.
    pub fn parse(message: &InboundMessage) -> Option<Self> {
        let (_, suffix) = message.topic.rsplit_once('/')?;
        match suffix {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write(
                String::from_utf8_lossy(&message.payload).trim().to_string(),
            )),
            _ => None,
        }
    }
}

/// Runs each request on its own task and keeps track of the ones in flight.
#[derive(Debug)]
pub struct RequestRouter {
    service: BridgeService,
    tasks: JoinSet<()>,
}

impl RequestRouter {
    pub fn new(service: BridgeService) -> Self {
        Self {
            service,
            tasks: JoinSet::new(),
        }
    }

    /// Start handling `message`. Returns the request it was recognised as.
    pub fn dispatch(&mut self, message: InboundMessage) -> Option<Request> {
        while let Some(finished) = self.tasks.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "request task failed");
            }
        }

        let Some(request) = Request::parse(&message) else {
            debug!(topic = %message.topic, "ignoring message on unknown topic");
            return None;
        };

        debug!(topic = %message.topic, ?request, "dispatching request");
        let service = self.service.clone();
        let task_request = request.clone();
        self.tasks.spawn(async move {
            match task_request {
                Request::Read => {
                    service.read_once().await;
                }
                Request::Write(payload) => {
                    service.write_once(&payload).await;
                }
            }
        });
        Some(request)
    }

    /// Number of requests that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `grace` for in-flight requests, then abort the rest.
    pub async fn drain(mut self, grace: Duration) {
        let pending = self.tasks.len();
        if pending == 0 {
            return;
        }
        debug!(pending, "waiting for in-flight requests");

        let finished = tokio::time::timeout(grace, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            warn!(remaining = self.tasks.len(), "aborting unfinished requests");
            self.tasks.shutdown().await;
        }
    }
}
