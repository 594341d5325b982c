//! Message bus side of the bridge.
//!
//! The service layer only sees two things: a [`Publisher`] to send events
//! out, and [`InboundMessage`]s to react to. [`mqtt`] provides both over an
//! MQTT broker; [`channel`] provides an in-process publisher.

pub mod channel;
pub mod mqtt;

use async_trait::async_trait;
use thiserror::Error;

pub use channel::{ChannelPublisher, PublishedMessage};
pub use mqtt::{MqttConnection, MqttPublisher};

/// A message received on one of the bridge's request topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Errors raised by the message bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The client request queue rejected the request.
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The broker connection failed.
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// No connection was accepted within the configured time.
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    /// The receiving side has gone away.
    #[error("Bus channel closed")]
    Closed,
}

/// Sends outbound events to the bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`, fire-and-forget.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;
}
