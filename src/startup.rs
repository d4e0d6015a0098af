//! Startup sequence
//!
//! ```text
//! StackUninitialized -> StackReady -> IndicatorReady -> AdvertisingStarted -> SteadyState
//! ```
//!
//! Failures before `IndicatorReady` halt startup: nothing is registered and
//! no telemetry runs. An advertising failure is logged and startup carries on,
//! so callbacks get registered and telemetry still ticks.

use core::fmt;
use core::future::Future;

use log::{debug, error, info, warn};

use crate::advertising::AdvertisingData;
use crate::indicator::{AppContext, IndicatorError, IndicatorPin};

/// Stages of the startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStage {
    StackUninitialized,
    /// Host stack running, indicator not yet configured
    StackReady,
    /// Indicator configured and driven off
    IndicatorReady,
    /// Advertising attempted; see [`Startup::advertising`]
    AdvertisingStarted,
    /// Callbacks registered, telemetry loop running
    SteadyState,
}

/// Errors reported by the Bluetooth host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// The radio could not be initialised
    RadioInit,
    /// The controller could not be attached to the host
    Controller,
    /// The GATT server could not be built
    GattServer,
    /// The controller rejected the advertising request
    Advertising,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioInit => f.write_str("radio init failed"),
            Self::Controller => f.write_str("controller unavailable"),
            Self::GattServer => f.write_str("GATT server setup failed"),
            Self::Advertising => f.write_str("advertising rejected"),
        }
    }
}

/// Failures that halt startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupError {
    StackInit(HostError),
    IndicatorBind(IndicatorError),
    IndicatorConfigure(IndicatorError),
}

impl StartupError {
    /// The stage startup was stuck in when it halted
    pub fn halted_at(&self) -> StartupStage {
        match self {
            Self::StackInit(_) => StartupStage::StackUninitialized,
            Self::IndicatorBind(_) | Self::IndicatorConfigure(_) => StartupStage::StackReady,
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInit(e) => write!(f, "Bluetooth init failed ({})", e),
            Self::IndicatorBind(e) => write!(f, "indicator bind failed ({})", e),
            Self::IndicatorConfigure(e) => write!(f, "indicator configure failed ({})", e),
        }
    }
}

/// Board services the startup sequence drives
pub trait Platform {
    type Indicator: IndicatorPin;

    /// Bring up the Bluetooth host stack
    fn enable_stack(&mut self) -> Result<(), HostError>;

    /// Look up the pin wired to the indicator
    fn bind_indicator(&mut self) -> Result<Self::Indicator, IndicatorError>;

    /// Start connectable advertising with the given payload
    fn start_advertising(
        &mut self,
        data: &AdvertisingData,
    ) -> impl Future<Output = Result<(), HostError>>;
}

/// Result of a completed startup, ready for callback registration
pub struct Startup<P> {
    pub context: AppContext<P>,
    /// Whether advertising actually started
    pub advertising: bool,
    stage: StartupStage,
}

impl<P> Startup<P> {
    pub fn stage(&self) -> StartupStage {
        self.stage
    }

    /// Mark callbacks registered and hand the context over to the host side
    pub fn enter_steady_state(mut self) -> AppContext<P> {
        transition(&mut self.stage, StartupStage::SteadyState);
        self.context
    }
}

fn transition(stage: &mut StartupStage, next: StartupStage) {
    debug!("Startup: {:?} -> {:?}", stage, next);
    *stage = next;
}

/// Run the startup sequence up to (not including) callback registration.
pub async fn bring_up<PL: Platform>(
    platform: &mut PL,
    device_name: &str,
) -> Result<Startup<PL::Indicator>, StartupError> {
    let mut stage = StartupStage::StackUninitialized;

    platform.enable_stack().map_err(|e| halt(StartupError::StackInit(e)))?;
    transition(&mut stage, StartupStage::StackReady);

    let mut pin = platform
        .bind_indicator()
        .map_err(|e| halt(StartupError::IndicatorBind(e)))?;
    pin.configure()
        .map_err(|e| halt(StartupError::IndicatorConfigure(e)))?;

    let mut context = AppContext::new(pin);
    if let Err(e) = context.set_indicator(false) {
        warn!("Indicator: {}", e);
    }
    transition(&mut stage, StartupStage::IndicatorReady);

    info!("Bluetooth initialized");
    let advertising = start_advertising(platform, device_name).await;
    transition(&mut stage, StartupStage::AdvertisingStarted);

    Ok(Startup {
        context,
        advertising,
        stage,
    })
}

fn halt(e: StartupError) -> StartupError {
    error!("{}; startup halted", e);
    e
}

async fn start_advertising<PL: Platform>(platform: &mut PL, device_name: &str) -> bool {
    let data = match AdvertisingData::new(device_name) {
        Ok(data) => data,
        Err(e) => {
            error!("Advertising failed to start ({})", e);
            return false;
        }
    };

    match platform.start_advertising(&data).await {
        Ok(()) => {
            info!("Advertising successfully started");
            true
        }
        Err(e) => {
            error!("Advertising failed to start ({})", e);
            false
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock platform for testing

    use super::*;
    use crate::indicator::mock::MockIndicator;
    use heapless::Vec;

    /// Platform whose individual steps can be made to fail
    pub struct MockPlatform {
        calls: Vec<&'static str, 8>,
        pub stack_error: Option<HostError>,
        pub bind_error: Option<IndicatorError>,
        /// Hand out an indicator whose configuration fails
        pub configure_fails: bool,
        pub advertising_error: Option<HostError>,
        advertised: Option<AdvertisingData>,
    }

    impl MockPlatform {
        pub fn new() -> Self {
            Self {
                calls: Vec::new(),
                stack_error: None,
                bind_error: None,
                configure_fails: false,
                advertising_error: None,
                advertised: None,
            }
        }

        /// Names of the platform operations invoked, in order
        pub fn calls(&self) -> &[&'static str] {
            &self.calls
        }

        pub fn advertised(&self) -> Option<&AdvertisingData> {
            self.advertised.as_ref()
        }
    }

    impl Default for MockPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Platform for MockPlatform {
        type Indicator = MockIndicator;

        fn enable_stack(&mut self) -> Result<(), HostError> {
            let _ = self.calls.push("enable_stack");
            self.stack_error.map_or(Ok(()), Err)
        }

        fn bind_indicator(&mut self) -> Result<MockIndicator, IndicatorError> {
            let _ = self.calls.push("bind_indicator");
            match self.bind_error {
                Some(e) => Err(e),
                None if self.configure_fails => Ok(MockIndicator::failing_configure()),
                None => Ok(MockIndicator::new()),
            }
        }

        async fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), HostError> {
            let _ = self.calls.push("start_advertising");
            if let Some(e) = self.advertising_error {
                return Err(e);
            }
            self.advertised = Some(data.clone());
            Ok(())
        }
    }
}
