//! Advertising payload builder
//!
//! The advertising data is a fixed list of AD structures:
//! ```text
//! [0x02][0x01 Flags][0x06]
//! [0x07][0x03 Complete 16-bit UUIDs][HRS lo hi][BAS lo hi][DIS lo hi]
//! [0x11][0x07 Complete 128-bit UUIDs][vendor UART service, 16 bytes LE]
//! ```
//!
//! The complete local name goes in the scan response so the advertising
//! packet stays within the 31-byte legacy limit.

use core::fmt;
use core::future::Future;

use heapless::Vec;
use log::warn;
use trouble_host::prelude::{AdStructure, BR_EDR_NOT_SUPPORTED, LE_GENERAL_DISCOVERABLE};

use crate::config::gap::ADV_DATA_MAX;
use crate::config::uuids;
use crate::telemetry::PeriodicTick;

/// Advertised 16-bit services, in on-air order
pub const SERVICE_UUIDS_16: [[u8; 2]; 3] = [
    uuids::HEART_RATE_SERVICE.to_le_bytes(),
    uuids::BATTERY_SERVICE.to_le_bytes(),
    uuids::DEVICE_INFORMATION_SERVICE.to_le_bytes(),
];

/// Advertised 128-bit services
pub const SERVICE_UUIDS_128: [[u8; 16]; 1] = [uuids::UART_SERVICE_ADV];

/// Errors while building advertising data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingError {
    /// The AD structures do not fit in the output buffer
    BufferTooSmall,
}

impl fmt::Display for AdvertisingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("advertising data too large"),
        }
    }
}

/// Encode the advertising records into `buf`, returning the length written
pub fn encode_adv_data(buf: &mut [u8]) -> Result<usize, AdvertisingError> {
    AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids16(&SERVICE_UUIDS_16),
            AdStructure::ServiceUuids128(&SERVICE_UUIDS_128),
        ],
        buf,
    )
    .map_err(|_| AdvertisingError::BufferTooSmall)
}

/// Encode the scan response (complete local name) into `buf`
pub fn encode_scan_data(device_name: &str, buf: &mut [u8]) -> Result<usize, AdvertisingError> {
    AdStructure::encode_slice(&[AdStructure::CompleteLocalName(device_name.as_bytes())], buf)
        .map_err(|_| AdvertisingError::BufferTooSmall)
}

/// Encoded advertising data plus scan response, ready to hand to the host stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    adv_data: Vec<u8, ADV_DATA_MAX>,
    scan_data: Vec<u8, ADV_DATA_MAX>,
}

impl AdvertisingData {
    /// Build connectable advertising data carrying the fixed service list and
    /// a scan response with the device name.
    pub fn new(device_name: &str) -> Result<Self, AdvertisingError> {
        let mut buf = [0u8; ADV_DATA_MAX];

        let len = encode_adv_data(&mut buf)?;
        let adv_data = Vec::from_slice(&buf[..len]).map_err(|_| AdvertisingError::BufferTooSmall)?;

        let len = encode_scan_data(device_name, &mut buf)?;
        let scan_data = Vec::from_slice(&buf[..len]).map_err(|_| AdvertisingError::BufferTooSmall)?;

        Ok(Self { adv_data, scan_data })
    }

    pub fn adv_data(&self) -> &[u8] {
        &self.adv_data
    }

    pub fn scan_data(&self) -> &[u8] {
        &self.scan_data
    }
}

/// A host that can start connectable advertising
pub trait Advertise {
    /// Handle to the running advertisement
    type Advertiser;
    type Error: fmt::Debug;

    fn advertise(
        &mut self,
        data: &AdvertisingData,
    ) -> impl Future<Output = Result<Self::Advertiser, Self::Error>>;
}

/// Restart advertising after a link ends.
///
/// Failures are logged and retried on each `retry` tick until the host
/// accepts, so the peripheral never stays undiscoverable.
pub async fn readvertise<A: Advertise, T: PeriodicTick>(
    host: &mut A,
    data: &AdvertisingData,
    retry: &mut T,
) -> A::Advertiser {
    loop {
        match host.advertise(data).await {
            Ok(advertiser) => return advertiser,
            Err(e) => {
                warn!("BLE: Advertising failed to restart ({:?}), retrying", e);
                retry.next().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::mock::MockTicker;

    const EXPECTED_ADV: [u8; 29] = [
        // Flags
        0x02, 0x01, 0x06,
        // Complete list of 16-bit UUIDs: HRS, BAS, DIS
        0x07, 0x03, 0x0D, 0x18, 0x0F, 0x18, 0x0A, 0x18,
        // Complete list of 128-bit UUIDs: vendor UART service
        0x11, 0x07, 0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3, 0xA3, 0xB5, 0x00,
        0x01, 0x40, 0x6E,
    ];

    #[test]
    fn test_advertising_payload_is_byte_exact() {
        let data = AdvertisingData::new("HR").unwrap();
        assert_eq!(data.adv_data(), &EXPECTED_ADV);
    }

    #[test]
    fn test_uuid16_list_order() {
        assert_eq!(SERVICE_UUIDS_16, [[0x0D, 0x18], [0x0F, 0x18], [0x0A, 0x18]]);
    }

    #[test]
    fn test_scan_response_carries_name() {
        let data = AdvertisingData::new("Heartbeat").unwrap();
        let scan = data.scan_data();

        assert_eq!(scan[0] as usize, "Heartbeat".len() + 1);
        assert_eq!(scan[1], 0x09);
        assert_eq!(&scan[2..], b"Heartbeat");
    }

    #[test]
    fn test_configured_name_fits_scan_response() {
        let data = AdvertisingData::new(crate::config::gap::DEVICE_NAME).unwrap();
        assert!(data.scan_data().len() <= ADV_DATA_MAX);
    }

    #[test]
    fn test_name_too_long_is_rejected() {
        let name = "A name that is far too long for a scan response";
        assert_eq!(
            AdvertisingData::new(name),
            Err(AdvertisingError::BufferTooSmall)
        );
    }

    /// Host that rejects the first `failures` advertising requests
    struct FlakyHost {
        failures: u32,
        attempts: u32,
    }

    impl Advertise for FlakyHost {
        type Advertiser = u32;
        type Error = &'static str;

        async fn advertise(&mut self, _data: &AdvertisingData) -> Result<u32, &'static str> {
            self.attempts += 1;
            if self.attempts <= self.failures {
                Err("busy")
            } else {
                Ok(self.attempts)
            }
        }
    }

    #[test]
    fn test_readvertise_first_attempt() {
        let data = AdvertisingData::new("HR").unwrap();
        let mut host = FlakyHost { failures: 0, attempts: 0 };
        let mut retry = MockTicker::new(0);

        let advertiser = futures::executor::block_on(readvertise(&mut host, &data, &mut retry));
        assert_eq!(advertiser, 1);
    }

    #[test]
    fn test_readvertise_retries_after_failures() {
        let data = AdvertisingData::new("HR").unwrap();
        let mut host = FlakyHost { failures: 2, attempts: 0 };
        // Exactly one retry tick per failure; a third wait would never complete
        let mut retry = MockTicker::new(2);

        let advertiser = futures::executor::block_on(readvertise(&mut host, &data, &mut retry));
        assert_eq!(advertiser, 3);
        assert_eq!(host.attempts, 3);
    }

    #[test]
    fn test_encode_into_short_buffer_fails() {
        let mut buf = [0u8; 10];
        assert_eq!(
            encode_adv_data(&mut buf),
            Err(AdvertisingError::BufferTooSmall)
        );
    }
}
