//! End-to-end tests of the bridge on a mock port.
//!
//! Each test wires a `BridgeService` to a `MockSerialPort` and a channel
//! publisher, then drives it the way the binary does: through the request
//! router and the read loop.

mod common;

use common::{
    create_echo_mock_port, create_mock_port_with_responses, mock_settings, topic, BridgeHarness,
};
use pretty_assertions::assert_eq;
use serial_mqtt_adapter::bus::InboundMessage;
use serial_mqtt_adapter::port::{DuplexMode, MockSerialPort};
use serial_mqtt_adapter::service::{IoEvent, Operation, ReadLoop, RequestRouter};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn error_json(payload: &str) -> serde_json::Value {
    serde_json::from_str(payload).expect("error payload is JSON")
}

// ============================================================================
// Single operations
// ============================================================================

#[tokio::test]
async fn test_read_publishes_hex_response() {
    let mock = create_mock_port_with_responses("MOCK0", vec![&[0xab, 0xcd]]);
    let mut harness = BridgeHarness::new(mock, DuplexMode::Half);

    let event = harness.service.read_once().await;

    assert_eq!(event, Some(IoEvent::Response("abcd".to_string())));
    let published = harness.next_published(WAIT).await.unwrap();
    assert_eq!(published.topic, topic("response"));
    assert_eq!(published.payload, "abcd");
}

#[tokio::test]
async fn test_empty_read_publishes_nothing() {
    let mut harness = BridgeHarness::new(MockSerialPort::new("MOCK0"), DuplexMode::Half);

    assert_eq!(harness.service.read_once().await, None);
    assert!(harness.drain_published().is_empty());
}

#[tokio::test]
async fn test_write_success_publishes_nothing() {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.set_write_capacity(Some(4));
    let mut harness = BridgeHarness::new(mock, DuplexMode::Half);

    let event = harness.service.write_once("deadbeef").await;

    assert_eq!(event, None);
    assert_eq!(harness.mock.get_write_log(), vec![vec![0xde, 0xad, 0xbe, 0xef]]);
    assert!(harness.drain_published().is_empty());
}

#[tokio::test]
async fn test_invalid_hex_reports_write_error() {
    let mut harness = BridgeHarness::new(MockSerialPort::new("MOCK0"), DuplexMode::Half);

    harness.service.write_once("zz").await;

    let published = harness.next_published(WAIT).await.unwrap();
    assert_eq!(published.topic, topic("error"));
    assert_eq!(error_json(&published.payload)["operation"], "write");
    assert_eq!(harness.mock.bytes_written(), 0);
}

#[tokio::test]
async fn test_short_write_reports_counts() {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.set_write_capacity(Some(1));
    let mut harness = BridgeHarness::new(mock, DuplexMode::Half);

    harness.service.write_once("0102").await;

    let published = harness.next_published(WAIT).await.unwrap();
    let payload = error_json(&published.payload);
    assert_eq!(payload["operation"], "write");
    assert_eq!(payload["error"], "Short write: 1 of 2 bytes written");
}

#[tokio::test]
async fn test_echo_round_trip_is_case_insensitive() {
    let mut harness = BridgeHarness::new(create_echo_mock_port("MOCK0"), DuplexMode::Full);

    assert_eq!(harness.service.write_once("DEADBEEF").await, None);
    harness.service.read_once().await;

    let published = harness.next_published(WAIT).await.unwrap();
    assert_eq!(published.payload.to_uppercase(), "DEADBEEF");
}

// ============================================================================
// Read loop
// ============================================================================

#[tokio::test]
async fn test_read_loop_continues_after_read_failure() {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.fail_next_read("device unplugged");
    mock.enqueue_read(&[0x01]);
    let mut harness = BridgeHarness::new(mock, DuplexMode::Half);

    let read_loop = ReadLoop::spawn(harness.service.clone(), Duration::from_millis(5));

    let first = harness.next_published(WAIT).await.unwrap();
    assert_eq!(first.topic, topic("error"));
    let payload = error_json(&first.payload);
    assert_eq!(payload["operation"], "read");
    assert!(payload["error"].as_str().unwrap().contains("device unplugged"));

    let second = harness.next_published(WAIT).await.unwrap();
    assert_eq!(second.topic, topic("response"));
    assert_eq!(second.payload, "01");

    read_loop.stop();
    read_loop.join().await.unwrap();
}

#[tokio::test]
async fn test_read_loop_stops_promptly_and_is_joined() {
    let harness = BridgeHarness::new(MockSerialPort::new("MOCK0"), DuplexMode::Half);
    let read_loop = ReadLoop::spawn(harness.service.clone(), Duration::from_secs(30));
    tokio::time::sleep(Duration::from_millis(50)).await;

    read_loop.stop();
    read_loop.stop();
    let iterations = tokio::time::timeout(WAIT, read_loop.join())
        .await
        .expect("loop exits without waiting out the backoff")
        .unwrap();

    assert!(iterations >= 1);
}

#[tokio::test]
async fn test_read_loop_shutdown_reports_iterations() {
    let harness = BridgeHarness::new(MockSerialPort::new("MOCK0"), DuplexMode::Full);
    let read_loop = ReadLoop::spawn(harness.service.clone(), Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(30)).await;

    let iterations = read_loop.shutdown(WAIT).await;

    assert!(iterations.is_some_and(|n| n > 1));
}

// ============================================================================
// Request router
// ============================================================================

#[tokio::test]
async fn test_router_handles_read_and_write() {
    let mut harness = BridgeHarness::new(create_echo_mock_port("MOCK0"), DuplexMode::Half);
    let mut router = RequestRouter::new(harness.service.clone());

    router.dispatch(InboundMessage::new(topic("write"), b"cafe".to_vec()));
    router.drain(WAIT).await;

    let mut router = RequestRouter::new(harness.service.clone());
    router.dispatch(InboundMessage::new(topic("read"), Vec::new()));
    router.drain(WAIT).await;

    let published = harness.drain_published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, topic("response"));
    assert_eq!(published[0].payload, "cafe");
}

#[tokio::test]
async fn test_router_ignores_unknown_topics() {
    let mut harness = BridgeHarness::new(create_echo_mock_port("MOCK0"), DuplexMode::Half);
    let mut router = RequestRouter::new(harness.service.clone());

    let request = router.dispatch(InboundMessage::new(topic("status"), b"ff".to_vec()));

    assert_eq!(request, None);
    assert_eq!(router.in_flight(), 0);
    router.drain(WAIT).await;
    assert_eq!(harness.mock.bytes_written(), 0);
    assert!(harness.drain_published().is_empty());
}

#[tokio::test]
async fn test_failed_write_does_not_stop_router() {
    let mut harness = BridgeHarness::new(create_echo_mock_port("MOCK0"), DuplexMode::Half);
    let mut router = RequestRouter::new(harness.service.clone());

    router.dispatch(InboundMessage::new(topic("write"), b"not-hex".to_vec()));
    router.dispatch(InboundMessage::new(topic("write"), b"00ff".to_vec()));
    router.drain(WAIT).await;

    assert_eq!(harness.mock.get_write_log(), vec![vec![0x00, 0xff]]);
    let errors: Vec<_> = harness
        .drain_published()
        .into_iter()
        .filter(|m| m.topic == topic("error"))
        .collect();
    assert_eq!(errors.len(), 1);
}

// ============================================================================
// Duplex behaviour under load
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_half_duplex_requests_never_overlap_read_loop() {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.set_op_delay(Duration::from_millis(15));
    let harness = BridgeHarness::new(mock, DuplexMode::Half);
    let read_loop = ReadLoop::spawn(harness.service.clone(), Duration::from_millis(1));
    let mut router = RequestRouter::new(harness.service.clone());

    for _ in 0..5 {
        router.dispatch(InboundMessage::new(topic("write"), b"a5".to_vec()));
        router.dispatch(InboundMessage::new(topic("read"), Vec::new()));
    }
    router.drain(WAIT).await;
    read_loop.shutdown(WAIT).await;

    assert_eq!(harness.mock.max_concurrent_ops(), 1);
    assert_eq!(harness.mock.bytes_written(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_duplex_write_overlaps_read_loop() {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.set_op_delay(Duration::from_millis(50));
    let harness = BridgeHarness::with_settings(mock, mock_settings("MOCK0"), DuplexMode::Full);
    let read_loop = ReadLoop::spawn(harness.service.clone(), Duration::ZERO);
    let mut router = RequestRouter::new(harness.service.clone());

    for _ in 0..3 {
        router.dispatch(InboundMessage::new(topic("write"), b"a5".to_vec()));
    }
    router.drain(WAIT).await;
    read_loop.shutdown(WAIT).await;

    assert!(harness.mock.overlap_observed());
}

#[tokio::test]
async fn test_event_operation_matches_request() {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.fail_next_read("framing error");
    let harness = BridgeHarness::new(mock, DuplexMode::Half);

    let read_event = harness.service.read_once().await;
    let write_event = harness.service.write_once("0").await;

    assert!(matches!(
        read_event,
        Some(IoEvent::Error { operation: Operation::Read, .. })
    ));
    assert!(matches!(
        write_event,
        Some(IoEvent::Error { operation: Operation::Write, .. })
    ));
}
