//! ESP32-S3 host platform
//!
//! Implements the startup [`Platform`] over esp-radio + TrouBLE and the
//! telemetry sinks over the GATT server. The BLE host task owns the stack;
//! the rest of the firmware talks to it through the signals and channel here.

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel};
use embassy_sync::signal::Signal;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::peripherals::{BT, GPIO48};
use esp_hal::rng::Trng;
use heapless::String;
use log::debug;
use static_cell::StaticCell;
use trouble_host::prelude::*;

use crate::advertising::AdvertisingData;
use crate::ble::service::Server;
use crate::config::{self, device_info, gap};
use crate::indicator::{AppContext, GpioIndicator, IndicatorError};
use crate::startup::{HostError, Platform};
use crate::tasks::ble::ble_host_task;
use crate::telemetry::{BatteryStore, HeartRateNotifier, TelemetryError};

/// Type alias for the BLE controller
pub type BleController = ExternalController<esp_radio::ble::controller::BleConnector<'static>, 10>;

/// The connection indicator on this board
pub type Led = GpioIndicator<Output<'static>>;

/// Value pushed to the connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    HeartRate(u8),
    BatteryLevel(u8),
}

/// Telemetry fan-out to the active connection.
///
/// Parameters: CAP=4, SUBS=1 (the connection loop), PUBS=1. Nothing is
/// queued while no connection is subscribed.
pub static TELEMETRY_CHANNEL: PubSubChannel<CriticalSectionRawMutex, Measurement, 4, 1, 1> =
    PubSubChannel::new();

/// Advertising payload handed from startup to the BLE host task
pub(crate) static ADVERTISING_REQUEST: Signal<CriticalSectionRawMutex, AdvertisingData> =
    Signal::new();

/// Outcome of the first advertising attempt
pub(crate) static ADVERTISING_RESULT: Signal<CriticalSectionRawMutex, Result<(), HostError>> =
    Signal::new();

/// Application context for the connection handlers
pub(crate) static CALLBACKS: Signal<CriticalSectionRawMutex, AppContext<Led>> = Signal::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Static cell for the GATT server shared by the host and telemetry tasks
static SERVER: StaticCell<Server<'static>> = StaticCell::new();

const APPEARANCE: BluetoothUuid16 = BluetoothUuid16::new(gap::APPEARANCE);

/// Hand the connection handlers their context.
///
/// The host task accepts connections only after this is called.
pub fn register_callbacks(context: AppContext<Led>) {
    CALLBACKS.signal(context);
}

/// Startup platform for the ESP32-S3 board
pub struct EspPlatform {
    spawner: Spawner,
    bt: Option<BT<'static>>,
    led: Option<GPIO48<'static>>,
    server: Option<&'static Server<'static>>,
}

impl EspPlatform {
    pub fn new(spawner: Spawner, bt: BT<'static>, led: GPIO48<'static>) -> Self {
        Self {
            spawner,
            bt: Some(bt),
            led: Some(led),
            server: None,
        }
    }

    /// The GATT server, once the stack is enabled
    pub fn server(&self) -> Option<&'static Server<'static>> {
        self.server
    }

    fn build_server() -> Result<&'static Server<'static>, HostError> {
        let gap = GapConfig::Peripheral(PeripheralConfig {
            name: gap::DEVICE_NAME,
            appearance: &APPEARANCE,
        });
        let server = Server::new_with_config(gap).map_err(|_| HostError::GattServer)?;
        let server = SERVER.init(server);

        for (characteristic, value) in [
            (&server.dis.manufacturer_name, device_info::MANUFACTURER_NAME),
            (&server.dis.model_number, device_info::MODEL_NUMBER),
            (&server.dis.firmware_revision, device_info::FIRMWARE_REVISION),
        ] {
            let mut s: String<32> = String::new();
            s.push_str(value).map_err(|_| HostError::GattServer)?;
            characteristic.set(server, &s).map_err(|_| HostError::GattServer)?;
        }

        Ok(server)
    }
}

impl Platform for EspPlatform {
    type Indicator = Led;

    fn enable_stack(&mut self) -> Result<(), HostError> {
        let bt = self.bt.take().ok_or(HostError::Controller)?;
        let server = Self::build_server()?;

        let radio = esp_radio::init().map_err(|_| HostError::RadioInit)?;
        let radio = RADIO_CONTROLLER.init(radio);

        let connector = esp_radio::ble::controller::BleConnector::new(
            radio,
            bt,
            esp_radio::ble::Config::default(),
        )
        .map_err(|_| HostError::Controller)?;
        let controller: BleController = ExternalController::new(connector);

        // Seeds the security manager
        let rng = Trng::try_new().map_err(|_| HostError::RadioInit)?;

        self.spawner
            .spawn(ble_host_task(controller, server, rng))
            .map_err(|_| HostError::Controller)?;

        self.server = Some(server);
        Ok(())
    }

    fn bind_indicator(&mut self) -> Result<Led, IndicatorError> {
        let pin = self.led.take().ok_or(IndicatorError::NotBound)?;
        debug!("Indicator on GPIO{}", config::led::PIN);
        let output = Output::new(pin, Level::Low, OutputConfig::default());
        Ok(GpioIndicator::new(output))
    }

    async fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), HostError> {
        ADVERTISING_REQUEST.signal(data.clone());
        ADVERTISING_RESULT.wait().await
    }
}

/// Heart-rate notifications via [`TELEMETRY_CHANNEL`]
pub struct ChannelNotifier {
    publisher: ImmediatePublisher<'static, CriticalSectionRawMutex, Measurement, 4, 1, 1>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self {
            publisher: TELEMETRY_CHANNEL.immediate_publisher(),
        }
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartRateNotifier for ChannelNotifier {
    fn notify_heart_rate(&mut self, bpm: u8) -> Result<(), TelemetryError> {
        self.publisher.publish_immediate(Measurement::HeartRate(bpm));
        Ok(())
    }
}

/// Battery level stored in the Battery Service characteristic
pub struct GattBatteryStore {
    server: &'static Server<'static>,
    publisher: ImmediatePublisher<'static, CriticalSectionRawMutex, Measurement, 4, 1, 1>,
}

impl GattBatteryStore {
    pub fn new(server: &'static Server<'static>) -> Self {
        Self {
            server,
            publisher: TELEMETRY_CHANNEL.immediate_publisher(),
        }
    }
}

impl BatteryStore for GattBatteryStore {
    fn battery_level(&mut self) -> Result<u8, TelemetryError> {
        self.server
            .bas
            .level
            .get(self.server)
            .map_err(|_| TelemetryError::StoreUnavailable)
    }

    fn set_battery_level(&mut self, level: u8) -> Result<(), TelemetryError> {
        self.server
            .bas
            .level
            .set(self.server, &level)
            .map_err(|_| TelemetryError::StoreUnavailable)?;
        // Subscribed peers are notified of every change
        self.publisher.publish_immediate(Measurement::BatteryLevel(level));
        Ok(())
    }
}
