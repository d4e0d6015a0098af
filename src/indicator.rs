//! Connection indicator and application context
//!
//! The indicator LED mirrors whether a peer is believed to be connected.
//! The LED state lives in [`AppContext`] alongside the pin that drives it,
//! and the connection handlers receive the context explicitly.

use core::fmt;

use embedded_hal::digital::OutputPin;

/// Errors from the indicator output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorError {
    /// The board has no pin bound to the indicator
    NotBound,
    /// Configuring the pin as an output failed
    Configure,
    /// Driving the pin level failed
    Write,
}

impl fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotBound => f.write_str("indicator pin not bound"),
            Self::Configure => f.write_str("indicator pin configuration failed"),
            Self::Write => f.write_str("indicator pin write failed"),
        }
    }
}

/// A single digital output driving the indicator, active-high
pub trait IndicatorPin {
    /// Put the pin into output mode
    fn configure(&mut self) -> Result<(), IndicatorError> {
        Ok(())
    }

    /// Drive the pin: `true` lights the indicator
    fn set_level(&mut self, on: bool) -> Result<(), IndicatorError>;
}

/// Indicator backed by any `embedded-hal` output pin
pub struct GpioIndicator<P> {
    pin: P,
}

impl<P: OutputPin> GpioIndicator<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> IndicatorPin for GpioIndicator<P> {
    fn configure(&mut self) -> Result<(), IndicatorError> {
        // The HAL hands out pins already in output mode; park it low
        self.pin.set_low().map_err(|_| IndicatorError::Configure)
    }

    fn set_level(&mut self, on: bool) -> Result<(), IndicatorError> {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| IndicatorError::Write)
    }
}

/// State shared by the connection handlers
pub struct AppContext<P> {
    pin: P,
    led_on: bool,
}

impl<P: IndicatorPin> AppContext<P> {
    /// Create a context with the indicator believed off
    pub fn new(pin: P) -> Self {
        Self { pin, led_on: false }
    }

    /// Record the indicator state and drive the pin to match.
    ///
    /// The recorded state is updated even when the pin write fails; the
    /// error is returned so the caller can report it.
    pub fn set_indicator(&mut self, on: bool) -> Result<(), IndicatorError> {
        self.led_on = on;
        self.pin.set_level(on)
    }

    /// Whether at least one connection is believed present
    pub fn indicator(&self) -> bool {
        self.led_on
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockIndicator;
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    /// Output pin that remembers its level
    struct FakePin {
        high: bool,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct PinFault;

    impl embedded_hal::digital::Error for PinFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Output pin whose every operation fails
    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = PinFault;
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(PinFault)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(PinFault)
        }
    }

    #[test]
    fn test_gpio_indicator_drives_pin() {
        let mut indicator = GpioIndicator::new(FakePin { high: true });

        indicator.configure().unwrap();
        assert!(!indicator.pin.high);

        indicator.set_level(true).unwrap();
        assert!(indicator.pin.high);

        indicator.set_level(false).unwrap();
        assert!(!indicator.into_inner().high);
    }

    #[test]
    fn test_gpio_indicator_maps_errors() {
        let mut indicator = GpioIndicator::new(BrokenPin);

        assert_eq!(indicator.configure(), Err(IndicatorError::Configure));
        assert_eq!(indicator.set_level(true), Err(IndicatorError::Write));
    }

    #[test]
    fn test_context_starts_off() {
        let context = AppContext::new(MockIndicator::new());
        assert!(!context.indicator());
        assert!(context.pin().levels().is_empty());
    }

    #[test]
    fn test_set_indicator_mirrors_pin() {
        let mut context = AppContext::new(MockIndicator::new());

        context.set_indicator(true).unwrap();
        assert!(context.indicator());
        assert_eq!(context.pin().last_level(), Some(true));

        context.set_indicator(false).unwrap();
        assert!(!context.indicator());
        assert_eq!(context.pin().levels(), &[true, false]);
    }

    #[test]
    fn test_state_recorded_when_write_fails() {
        let mut context = AppContext::new(MockIndicator::failing());

        assert_eq!(context.set_indicator(true), Err(IndicatorError::Write));
        assert!(context.indicator());
    }
}
