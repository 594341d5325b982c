//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! # Set environment variables
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! # Run tests
//! cargo test --features hardware-tests -- --ignored
//! ```

use super::utils::{is_port_available, skip_without_hardware};
use serial_mqtt_adapter::port::{DuplexCoordinator, DuplexMode, PortErrorKind};
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    let Some(config) = skip_without_hardware() else {
        return;
    };
    println!("Testing port: {} at {} baud", config.port_name, config.baud_rate);

    let mut handle = config.open();
    assert_eq!(handle.name(), config.port_name);
    handle.flush().expect("flush");

    handle.close().expect("close");
    assert_eq!(
        handle.close().unwrap_err().kind(),
        PortErrorKind::AlreadyClosed
    );
    println!("✅ Port open/close test passed");
}

#[test]
#[ignore]
fn test_real_port_is_enumerated() {
    let Some(config) = skip_without_hardware() else {
        return;
    };

    assert!(
        is_port_available(&config.port_name),
        "{} not found among available ports",
        config.port_name
    );
}

#[test]
#[ignore]
fn test_real_port_loopback_hex() {
    let Some(config) = skip_without_hardware() else {
        return;
    };
    if !config.loopback_enabled {
        println!("⏭️  Skipping loopback test: TEST_LOOPBACK not set to 1");
        return;
    }

    let mut handle = config.open();
    handle.flush().expect("Failed to clear buffers");

    let written = handle.write_hex("4c4f4f504241434b0d0a").expect("write");
    assert_eq!(written, 10);

    // Small delay for data to loop back
    std::thread::sleep(Duration::from_millis(100));

    let outcome = handle.read().expect("read");
    assert_eq!(outcome.payload, "4c4f4f504241434b0d0a");
    println!("✅ Loopback test passed");
}

#[tokio::test]
#[ignore]
async fn test_real_port_full_duplex_loopback() {
    let Some(config) = skip_without_hardware() else {
        return;
    };
    if !config.loopback_enabled {
        println!("⏭️  Skipping loopback test: TEST_LOOPBACK not set to 1");
        return;
    }

    let coordinator = DuplexCoordinator::new(config.open(), DuplexMode::Full)
        .expect("driver supports cloned handles");
    coordinator.flush().await.expect("flush");

    coordinator.write_hex("a55a").await.expect("write");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let outcome = coordinator.read().await.expect("read");

    assert_eq!(outcome.payload, "a55a");
    coordinator.close().await.expect("close");
}
