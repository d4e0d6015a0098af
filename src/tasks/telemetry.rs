//! Telemetry task
//!
//! Ticks the heart-rate and battery simulators once per period for as long as
//! the firmware runs, whether or not a peer is connected.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use crate::ble::platform::{ChannelNotifier, GattBatteryStore};
use crate::ble::service::Server;
use crate::config::telemetry::TICK_PERIOD_MS;
use crate::telemetry::Telemetry;

/// Signal to stop the telemetry loop
pub static TELEMETRY_SHUTDOWN: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Task that runs simulated telemetry into the GATT server
#[embassy_executor::task]
pub async fn telemetry_task(server: &'static Server<'static>) {
    let mut telemetry = Telemetry::new(ChannelNotifier::new(), GattBatteryStore::new(server));
    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));

    telemetry.run(&mut ticker, &TELEMETRY_SHUTDOWN).await;
}
