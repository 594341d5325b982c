//! Port abstraction layer for serial communication.
//!
//! Provides the adapter trait with real and mock implementations, the
//! [`PortHandle`] transport built on top of it, and the
//! [`DuplexCoordinator`] that serializes async access.

pub mod duplex;
pub mod error;
pub mod handle;
pub mod line;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use duplex::{DuplexCoordinator, DuplexMode, PortAccess};
pub use error::{PortError, PortErrorKind, PortResult};
pub use handle::{DeadlineKind, Direction, PortHandle, ReadOutcome};
pub use line::LinePlan;
pub use mock::MockSerialPort;
pub use sync_port::SyncSerialPort;
pub use traits::*;
