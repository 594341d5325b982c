//! Shared test utilities for the serial MQTT adapter tests.
//!
//! This module provides common test infrastructure including:
//! - Mock port creation with pre-programmed responses
//! - A bridge harness wired to a channel publisher
//! - Builders for raw adapter settings

#![allow(dead_code)]

use serde_json::Value;
use serial_mqtt_adapter::bus::{ChannelPublisher, PublishedMessage};
use serial_mqtt_adapter::config::{PortSettings, RawSettings};
use serial_mqtt_adapter::port::{DuplexCoordinator, DuplexMode, MockSerialPort, PortHandle};
use serial_mqtt_adapter::service::BridgeService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Topic root used by every harness.
pub const TOPIC_ROOT: &str = "test/uart";

/// Create a mock serial port with pre-programmed responses.
///
/// # Example
/// ```ignore
/// let mock = create_mock_port_with_responses("MOCK0", vec![&[0xab, 0xcd]]);
/// ```
pub fn create_mock_port_with_responses(port_name: &str, responses: Vec<&[u8]>) -> MockSerialPort {
    let mut mock = MockSerialPort::new(port_name);
    for response in responses {
        mock.enqueue_read(response);
    }
    mock
}

/// Create a mock port that loops every write back into its read queue.
pub fn create_echo_mock_port(port_name: &str) -> MockSerialPort {
    let mut mock = MockSerialPort::new(port_name);
    mock.set_echo(true);
    mock
}

/// Turn a `json!` object into raw adapter settings.
pub fn raw_settings(value: Value) -> RawSettings {
    match value {
        Value::Object(map) => map,
        other => panic!("adapter settings must be an object, got {other}"),
    }
}

/// Settings for a mock port with a short poll timeout so tests stay fast.
pub fn mock_settings(port_name: &str) -> PortSettings {
    PortSettings::new(port_name, 9600)
        .expect("valid settings")
        .with_poll_timeout(Duration::from_millis(10))
}

/// A bridge service running on a mock port.
pub struct BridgeHarness {
    pub service: BridgeService,
    pub mock: MockSerialPort,
    pub published: UnboundedReceiver<PublishedMessage>,
}

impl BridgeHarness {
    /// Build a harness around `mock` in the given duplex mode.
    pub fn new(mock: MockSerialPort, mode: DuplexMode) -> Self {
        Self::with_settings(mock, mock_settings("MOCK0"), mode)
    }

    pub fn with_settings(mock: MockSerialPort, settings: PortSettings, mode: DuplexMode) -> Self {
        let handle = PortHandle::attach(Box::new(mock.clone()), settings).expect("attach mock");
        let coordinator = Arc::new(DuplexCoordinator::new(handle, mode).expect("coordinator"));
        let (publisher, published) = ChannelPublisher::new();
        let service = BridgeService::new(coordinator, Arc::new(publisher), TOPIC_ROOT);

        Self {
            service,
            mock,
            published,
        }
    }

    /// Wait up to `timeout` for the next published message.
    pub async fn next_published(&mut self, timeout: Duration) -> Option<PublishedMessage> {
        tokio::time::timeout(timeout, self.published.recv())
            .await
            .ok()
            .flatten()
    }

    /// Everything published so far, without waiting.
    pub fn drain_published(&mut self) -> Vec<PublishedMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.published.try_recv() {
            messages.push(message);
        }
        messages
    }
}

/// Full topic name under the harness topic root.
pub fn topic(suffix: &str) -> String {
    format!("{TOPIC_ROOT}/{suffix}")
}
