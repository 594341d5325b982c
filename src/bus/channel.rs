//! In-process publisher backed by a tokio channel.

use super::{BusError, Publisher};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A message handed to a [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

/// [`Publisher`] that forwards every message to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<PublishedMessage>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiver its messages arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PublishedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        self.tx
            .send(PublishedMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| BusError::Closed)
    }
}
