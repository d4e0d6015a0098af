#![cfg_attr(not(test), no_std)]

pub mod advertising;
pub mod config;
pub mod events;
pub mod indicator;
pub mod startup;
pub mod telemetry;

// These modules depend on the ESP32 HAL and BLE host only available with embedded feature
#[cfg(feature = "embedded")]
pub mod ble;
#[cfg(feature = "embedded")]
pub mod tasks;
