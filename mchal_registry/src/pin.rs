//! Pin claims and the GPIO view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pwm::PwmHandle;

/// The function a claimed pin is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFunction {
    /// Digital input.
    GPIOIn,
    /// Digital output.
    GPIOOut,
    /// Pulse-width modulation output.
    PWM,
}

/// A claimed pin, narrowed to the view matching its claimed function.
/// Requesting the wrong view (`as_gpio` on a `PWM` claim or vice versa)
/// is a programming error and panics, mirroring the contract's own
/// wording ("Requesting a mismatched view is a programming error").
pub enum PinHandle {
    /// View for `GPIOIn`/`GPIOOut` claims.
    Gpio(GpioHandle),
    /// View for `PWM` claims.
    Pwm(PwmHandle),
}

impl PinHandle {
    /// Narrow to the GPIO view.
    ///
    /// # Panics
    /// Panics if this handle was claimed as `PWM`.
    pub fn as_gpio(self) -> GpioHandle {
        match self {
            PinHandle::Gpio(g) => g,
            PinHandle::Pwm(_) => panic!("pin handle claimed as PWM, not GPIO"),
        }
    }

    /// Narrow to the PWM view.
    ///
    /// # Panics
    /// Panics if this handle was claimed as `GPIOIn`/`GPIOOut`.
    pub fn as_pwm(self) -> PwmHandle {
        match self {
            PinHandle::Pwm(p) => p,
            PinHandle::Gpio(_) => panic!("pin handle claimed as GPIO, not PWM"),
        }
    }
}

/// A non-blocking GPIO register view over one claimed pin.
///
/// There is no physical MCU register behind this (out of scope per the
/// device-internals exclusion); the level is held in an `AtomicBool`
/// simulating the register, sufficient for the registry's own
/// arbitration contract and for exercising devices against it in tests.
pub struct GpioHandle {
    pin: u32,
    direction: PinFunction,
    level: Arc<AtomicBool>,
}

impl GpioHandle {
    pub(crate) fn new(pin: u32, direction: PinFunction) -> Self {
        GpioHandle {
            pin,
            direction,
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The pin number.
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Current logical level.
    pub fn read(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }

    /// Drive the pin to `level`.
    ///
    /// # Panics
    /// Panics if this handle was claimed as `GPIOIn`.
    pub fn write(&self, level: bool) {
        assert_eq!(
            self.direction,
            PinFunction::GPIOOut,
            "pin {} claimed as input cannot be written",
            self.pin
        );
        self.level.store(level, Ordering::Relaxed);
    }

    pub(crate) fn reset_to_input(&self) {
        self.level.store(false, Ordering::Relaxed);
    }
}

impl Drop for GpioHandle {
    /// The contract requires every released pin to land back in an
    /// input-equivalent state regardless of the function it was claimed
    /// for; for the GPIO view that means driving the simulated register
    /// low before the handle (and the claim it represents) goes away.
    fn drop(&mut self) {
        self.reset_to_input();
    }
}
