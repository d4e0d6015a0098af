//! Simulated heart-rate and battery telemetry
//!
//! Every tick advances a heart-rate counter (90..=159) and decrements the
//! battery level held by the host's Battery Service, then pushes both to the
//! host. Neither depends on connection state.

use core::fmt;
use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::config::telemetry::{
    BATTERY_FULL, BATTERY_INITIAL, HEART_RATE_INITIAL, HEART_RATE_WRAP, SEPARATOR,
};

/// Heart Rate Measurement flags: uint8 value format, sensor contact supported
/// and detected
pub const HRM_FLAGS: u8 = 0x06;

/// Encode a Heart Rate Measurement characteristic value
pub const fn encode_heart_rate_measurement(bpm: u8) -> [u8; 2] {
    [HRM_FLAGS, bpm]
}

/// Errors from the host-side telemetry sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// The notification could not be queued
    NotifyFailed,
    /// The battery characteristic could not be read or written
    StoreUnavailable,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotifyFailed => f.write_str("notification failed"),
            Self::StoreUnavailable => f.write_str("battery store unavailable"),
        }
    }
}

/// Heart Rate Service notification primitive.
///
/// Sending with no subscribed peer is not an error.
pub trait HeartRateNotifier {
    fn notify_heart_rate(&mut self, bpm: u8) -> Result<(), TelemetryError>;
}

/// Battery Service characteristic store. The host owns the value.
pub trait BatteryStore {
    fn battery_level(&mut self) -> Result<u8, TelemetryError>;
    fn set_battery_level(&mut self, level: u8) -> Result<(), TelemetryError>;
}

/// Source of periodic ticks
pub trait PeriodicTick {
    /// Wait for the next tick
    fn next(&mut self) -> impl Future<Output = ()>;
}

#[cfg(feature = "embedded")]
impl PeriodicTick for embassy_time::Ticker {
    async fn next(&mut self) {
        embassy_time::Ticker::next(self).await
    }
}

/// Heart-rate counter, wraps from 159 back to 90
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateSimulator {
    value: u8,
}

impl HeartRateSimulator {
    pub const fn new() -> Self {
        Self {
            value: HEART_RATE_INITIAL,
        }
    }

    pub fn current(&self) -> u8 {
        self.value
    }

    /// Advance one tick and return the new value
    pub fn advance(&mut self) -> u8 {
        self.value += 1;
        if self.value == HEART_RATE_WRAP {
            self.value = HEART_RATE_INITIAL;
        }
        self.value
    }
}

impl Default for HeartRateSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Next battery level after one tick. A decrement to zero wraps to full.
///
/// Out-of-range levels are clamped to full before decrementing, so the result
/// is always in 1..=100.
pub fn battery_next(level: u8) -> u8 {
    match level.min(BATTERY_FULL).saturating_sub(1) {
        0 => BATTERY_FULL,
        next => next,
    }
}

/// Values produced by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySample {
    pub heart_rate: u8,
    pub battery_level: u8,
}

/// Drives both simulators into the host stack
pub struct Telemetry<N, S> {
    heart_rate: HeartRateSimulator,
    notifier: N,
    store: S,
}

impl<N: HeartRateNotifier, S: BatteryStore> Telemetry<N, S> {
    pub fn new(notifier: N, store: S) -> Self {
        Self {
            heart_rate: HeartRateSimulator::new(),
            notifier,
            store,
        }
    }

    /// Run one tick: heart rate first, then battery
    pub fn tick(&mut self) -> TelemetrySample {
        let heart_rate = self.heart_rate_tick();
        let battery_level = self.battery_tick();
        info!("{}", SEPARATOR);

        TelemetrySample {
            heart_rate,
            battery_level,
        }
    }

    fn heart_rate_tick(&mut self) -> u8 {
        let bpm = self.heart_rate.advance();
        info!("Heart Rate = {}", bpm);

        if let Err(e) = self.notifier.notify_heart_rate(bpm) {
            warn!("Heart rate notify: {}", e);
        }
        bpm
    }

    fn battery_tick(&mut self) -> u8 {
        let current = self.store.battery_level().unwrap_or_else(|e| {
            warn!("Battery level read: {}", e);
            BATTERY_INITIAL
        });

        let level = battery_next(current);
        info!("Battery Level = {}", level);

        if let Err(e) = self.store.set_battery_level(level) {
            warn!("Battery level write: {}", e);
        }
        level
    }

    /// Tick on every `ticker` period until `shutdown` is signalled.
    ///
    /// Returns the number of ticks run. A tick that is already due when the
    /// shutdown arrives still runs first.
    pub async fn run<T: PeriodicTick, M: RawMutex>(
        &mut self,
        ticker: &mut T,
        shutdown: &Signal<M, ()>,
    ) -> u32 {
        let mut ticks: u32 = 0;

        loop {
            match select(ticker.next(), shutdown.wait()).await {
                Either::First(()) => {
                    self.tick();
                    ticks = ticks.wrapping_add(1);
                }
                Either::Second(()) => {
                    info!("Telemetry stopped after {} ticks", ticks);
                    return ticks;
                }
            }
        }
    }

    pub fn heart_rate(&self) -> u8 {
        self.heart_rate.current()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
