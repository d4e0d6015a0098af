//! Bluetooth Low Energy module
//!
//! GATT services, the ESP32 host platform and the glue that feeds simulated
//! telemetry into the GATT server.

pub mod platform;
pub mod service;

pub use platform::{register_callbacks, EspPlatform, Led, Measurement, TELEMETRY_CHANNEL};
pub use service::Server;
