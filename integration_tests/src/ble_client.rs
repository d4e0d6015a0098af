//! BLE client for the heart-rate peripheral.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::bleuuid::uuid_from_u16;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// 16-bit service UUIDs advertised by the device, in advertising order
pub const ADVERTISED_SERVICES_16: [u16; 3] = [0x180D, 0x180F, 0x180A];

/// Vendor UUID carried in the advertising payload
pub const ADVERTISED_VENDOR_UUID: Uuid = Uuid::from_u128(0x6e400100_b5a3_f393_e0a9_e50e24dcca9e);

/// Nordic UART Service as registered in the GATT table
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

pub const HEART_RATE_MEASUREMENT: u16 = 0x2A37;
pub const BODY_SENSOR_LOCATION: u16 = 0x2A38;
pub const BATTERY_LEVEL: u16 = 0x2A19;
pub const MANUFACTURER_NAME: u16 = 0x2A29;
pub const MODEL_NUMBER: u16 = 0x2A24;
pub const FIRMWARE_REVISION: u16 = 0x2A26;

/// A device seen while scanning, before connecting
pub struct Discovered {
    pub peripheral: Peripheral,
    pub services: Vec<Uuid>,
}

/// BLE client for the heart-rate peripheral.
pub struct BleClient {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
    /// Heart Rate Measurement values received since the last clear
    measurements: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BleClient {
    /// Scan for a device by name and report its advertised services.
    pub async fn discover(name: &str, scan_timeout: Duration) -> Result<Discovered> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        // Start scanning
        adapter.start_scan(ScanFilter::default()).await?;

        // Wait for the device to appear
        let result = Self::find_device_by_name(&adapter, name, scan_timeout).await;

        adapter.stop_scan().await?;
        result
    }

    /// Connect to a discovered device and subscribe to heart-rate notifications.
    pub async fn connect(discovered: Discovered) -> Result<Self> {
        let peripheral = discovered.peripheral;

        // Connect to the device
        peripheral.connect().await?;

        // Discover services
        peripheral.discover_services().await?;

        let characteristics: Vec<Characteristic> = peripheral.characteristics().into_iter().collect();

        let hrm = characteristics
            .iter()
            .find(|c| c.uuid == uuid_from_u16(HEART_RATE_MEASUREMENT))
            .cloned()
            .ok_or_else(|| anyhow!("Heart Rate Measurement characteristic not found"))?;

        // Subscribe to notifications on the measurement characteristic
        peripheral.subscribe(&hrm).await?;

        let measurements = Arc::new(Mutex::new(Vec::new()));

        // Spawn notification handler
        let buffer_clone = measurements.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == uuid_from_u16(HEART_RATE_MEASUREMENT) {
                    buffer_clone.lock().await.push(data.value);
                }
            }
        });

        Ok(Self {
            peripheral,
            characteristics,
            measurements,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Discovered> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            let peripherals = adapter.peripherals().await?;

            for peripheral in peripherals {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(Discovered {
                            peripheral,
                            services: props.services,
                        });
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| anyhow!("Characteristic {} not found", uuid))
    }

    /// Read a characteristic identified by its 16-bit UUID.
    pub async fn read(&self, uuid16: u16) -> Result<Vec<u8>> {
        let characteristic = self.characteristic(uuid_from_u16(uuid16))?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    /// Read the Battery Level characteristic.
    pub async fn battery_level(&self) -> Result<u8> {
        let value = self.read(BATTERY_LEVEL).await?;
        value
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Empty battery level"))
    }

    /// Read a UTF-8 string characteristic.
    pub async fn read_string(&self, uuid16: u16) -> Result<String> {
        let value = self.read(uuid16).await?;
        Ok(String::from_utf8(value)?)
    }

    /// Whether the GATT table contains the given service.
    pub fn has_service(&self, uuid: Uuid) -> bool {
        self.peripheral.services().iter().any(|s| s.uuid == uuid)
    }

    /// Collect heart-rate measurements for the given duration.
    pub async fn collect_measurements(&self, duration: Duration) -> Vec<Vec<u8>> {
        self.measurements.lock().await.clear();
        tokio::time::sleep(duration).await;
        std::mem::take(&mut *self.measurements.lock().await)
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        let hrm = self.characteristic(uuid_from_u16(HEART_RATE_MEASUREMENT))?;
        self.peripheral.unsubscribe(hrm).await?;
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
