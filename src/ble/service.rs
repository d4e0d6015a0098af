//! GATT services exposed by the peripheral
//!
//! - Heart Rate Service (0x180D): Heart Rate Measurement (notify), Body Sensor Location (read)
//! - Battery Service (0x180F): Battery Level (read, notify)
//! - Device Information Service (0x180A): manufacturer, model and firmware strings
//! - Nordic UART Service: 6E400001-B5A3-F393-E0A9-E50E24DCCA9E

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use trouble_host::prelude::*;

use crate::config::telemetry::{BATTERY_INITIAL, HEART_RATE_INITIAL};
use crate::telemetry::encode_heart_rate_measurement;

/// Maximum write size accepted on the UART RX characteristic
pub const NUS_MAX_PACKET_SIZE: usize = 64;

/// Body Sensor Location: chest
pub const BODY_SENSOR_CHEST: u8 = 0x01;

/// Heart Rate Service
#[gatt_service(uuid = "180d")]
pub struct HeartRateService {
    /// Heart Rate Measurement: `[flags, bpm]`
    #[characteristic(uuid = "2a37", notify, value = encode_heart_rate_measurement(HEART_RATE_INITIAL))]
    pub measurement: [u8; 2],

    #[characteristic(uuid = "2a38", read, value = BODY_SENSOR_CHEST)]
    pub body_sensor_location: u8,
}

/// Battery Service
#[gatt_service(uuid = "180f")]
pub struct BatteryService {
    /// Battery Level in percent
    #[characteristic(uuid = "2a19", read, notify, value = BATTERY_INITIAL)]
    pub level: u8,
}

/// Device Information Service
#[gatt_service(uuid = "180a")]
pub struct DeviceInformationService {
    #[characteristic(uuid = "2a29", read)]
    pub manufacturer_name: heapless::String<32>,

    #[characteristic(uuid = "2a24", read)]
    pub model_number: heapless::String<32>,

    #[characteristic(uuid = "2a26", read)]
    pub firmware_revision: heapless::String<32>,
}

/// Nordic UART Service
///
/// Present so centrals filtering on the vendor UUID find the device; data
/// written to RX is accepted and dropped.
#[gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct NordicUartService {
    /// RX Characteristic - client writes here
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response, value = [0u8; NUS_MAX_PACKET_SIZE])]
    pub rx: [u8; NUS_MAX_PACKET_SIZE],

    /// TX Characteristic - server notifies here
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify, value = [0u8; NUS_MAX_PACKET_SIZE])]
    pub tx: [u8; NUS_MAX_PACKET_SIZE],
}

/// GATT server with all four services
#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct Server {
    pub hrs: HeartRateService,
    pub bas: BatteryService,
    pub dis: DeviceInformationService,
    pub nus: NordicUartService,
}
