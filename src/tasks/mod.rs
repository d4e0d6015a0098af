//! Embassy tasks module
//!
//! Contains all async tasks for the firmware, organised by functionality.

pub mod ble;
pub mod telemetry;

pub use ble::{ble_host_task, ble_task};
pub use telemetry::{telemetry_task, TELEMETRY_SHUTDOWN};
