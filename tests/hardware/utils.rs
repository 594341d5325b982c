//! Utility functions for hardware testing.

use serial_mqtt_adapter::config::PortSettings;
use serial_mqtt_adapter::port::PortHandle;
use serialport::{available_ports, SerialPortInfo};
use std::env;
use std::time::Duration;

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
}

impl TestPortConfig {
    /// Get test configuration from environment variables.
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);
        let loopback_enabled = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(TestPortConfig {
            port_name,
            baud_rate,
            loopback_enabled,
        })
    }

    /// Adapter settings for the test port.
    pub fn to_settings(&self) -> PortSettings {
        PortSettings::new(&self.port_name, self.baud_rate)
            .expect("TEST_BAUD must be a supported bit rate")
            .with_poll_timeout(Duration::from_millis(200))
    }

    /// Open the test port.
    pub fn open(&self) -> PortHandle {
        PortHandle::open(self.to_settings()).expect("failed to open TEST_PORT")
    }
}

/// Discover all available serial ports on the system.
pub fn discover_available_ports() -> Vec<SerialPortInfo> {
    available_ports().unwrap_or_default()
}

/// Check if a specific port is available.
pub fn is_port_available(port_name: &str) -> bool {
    discover_available_ports()
        .iter()
        .any(|p| p.port_name == port_name)
}

/// Skip test if hardware is not available.
pub fn skip_without_hardware() -> Option<TestPortConfig> {
    let config = TestPortConfig::from_env();
    if config.is_none() {
        println!("⏭️  Skipping hardware test: TEST_PORT not set");
    }
    config
}
