//! Board and application configuration constants for the ESP32-S3 heart-rate peripheral

/// Indicator LED
pub mod led {
    /// GPIO number of the connection indicator (driven active-high)
    pub const PIN: u8 = 48;
}

/// Simulated telemetry
pub mod telemetry {
    /// Interval between telemetry ticks
    pub const TICK_PERIOD_MS: u64 = 1000;

    /// Heart rate the simulator starts from (and resets to)
    pub const HEART_RATE_INITIAL: u8 = 90;

    /// Reaching this value resets the heart rate to [`HEART_RATE_INITIAL`]
    pub const HEART_RATE_WRAP: u8 = 160;

    /// Battery level exposed by the Battery Service at boot
    pub const BATTERY_INITIAL: u8 = 100;

    /// A decrement to zero wraps back to this level
    pub const BATTERY_FULL: u8 = 100;

    /// Line printed after every tick
    pub const SEPARATOR: &str = "==============================";
}

/// GAP / host stack configuration
pub mod gap {
    /// Complete local name, sent in the scan response
    pub const DEVICE_NAME: &str = "Heartbeat Peripheral";

    /// GAP appearance: Generic Heart Rate Sensor
    pub const APPEARANCE: u16 = 0x0340;

    /// Static random address (top two bits set as required for static addresses)
    pub const STATIC_ADDRESS: [u8; 6] = [0x5A, 0x3C, 0x11, 0x0D, 0x18, 0xC4];

    /// Number of maximum concurrent connections
    pub const CONNECTIONS_MAX: usize = 1;

    /// Number of L2CAP channels (ATT + SMP)
    pub const L2CAP_CHANNELS_MAX: usize = 2;

    /// Legacy advertising / scan response payload limit
    pub const ADV_DATA_MAX: usize = 31;

    /// Delay between attempts to restart advertising after a link ends
    pub const READVERTISE_RETRY_MS: u64 = 1000;

    /// HCI status reported when a link could not be brought up
    pub const CONNECTION_FAILED_TO_ESTABLISH: u8 = 0x3E;
}

/// Device Information Service strings
pub mod device_info {
    pub const MANUFACTURER_NAME: &str = "Heartbeat Labs";
    pub const MODEL_NUMBER: &str = "HB-S3-DEMO";
    pub const FIRMWARE_REVISION: &str = env!("CARGO_PKG_VERSION");
}

/// Assigned numbers and vendor UUIDs
pub mod uuids {
    /// Heart Rate Service
    pub const HEART_RATE_SERVICE: u16 = 0x180D;
    /// Battery Service
    pub const BATTERY_SERVICE: u16 = 0x180F;
    /// Device Information Service
    pub const DEVICE_INFORMATION_SERVICE: u16 = 0x180A;

    /// Vendor UART service UUID as it appears on air in the advertising payload
    /// (little-endian byte order)
    pub const UART_SERVICE_ADV: [u8; 16] = [
        0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3, 0xA3, 0xB5, 0x00, 0x01, 0x40,
        0x6E,
    ];
}
