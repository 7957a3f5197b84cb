//! Registry errors.

use mchal_types::error::ErrorCode;
use mchal_types::DeviceId;
use thiserror::Error;

/// Failures raised by resource-claim, release, and transaction
/// operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Pin number outside the board's allowed range.
    #[error("pin {0} is not on the board's allowed pin list")]
    UnknownPin(u32),
    /// Pin already claimed by another device.
    #[error("pin {pin} already claimed by {owner}")]
    PinInUse {
        /// The pin number.
        pin: u32,
        /// The device id currently holding the claim.
        owner: DeviceId,
    },
    /// Requested function cannot be realised on the pin (e.g. no PWM
    /// slice mapped).
    #[error("pin {0} does not support the requested function")]
    Unsupported(u32),
    /// Bus id not present in the compile-time bus plan.
    #[error("bus {0} is not in the resource plan")]
    UnknownBus(u32),
    /// A single-owner resource (UART port) is already held.
    #[error("resource already held by {0}")]
    Conflict(DeviceId),
    /// A PWM slice claim requested a frequency incompatible with its
    /// current user(s).
    #[error("pwm slice {slice} frequency conflict: requested {requested}hz, active {active}hz")]
    FrequencyConflict {
        /// Slice id.
        slice: u32,
        /// Frequency requested by this claim.
        requested: u32,
        /// Frequency already active on the slice.
        active: u32,
    },
    /// A ramp was requested while one was already active on the channel.
    #[error("ramp already active")]
    Busy,
    /// The per-bus worker did not complete the transaction before its
    /// deadline.
    #[error("i2c transaction timed out")]
    Timeout,
    /// The worker's request queue was full.
    #[error("i2c worker busy")]
    WorkerBusy,
    /// The worker task has shut down (registry closing or closed).
    #[error("resource registry is closed")]
    Unavailable,
    /// A release was attempted by a device that does not hold the claim;
    /// per contract this is ignored rather than erroring, but exposed so
    /// callers that want to log it can.
    #[error("release ignored: {0} does not hold this claim")]
    NotOwner(DeviceId),
}

impl From<&RegistryError> for ErrorCode {
    fn from(e: &RegistryError) -> Self {
        match e {
            RegistryError::UnknownPin(_) => ErrorCode::UnknownPin,
            RegistryError::PinInUse { .. } => ErrorCode::PinInUse,
            RegistryError::Unsupported(_) => ErrorCode::Unsupported,
            RegistryError::UnknownBus(_) => ErrorCode::UnknownBus,
            RegistryError::Conflict(_) => ErrorCode::Conflict,
            RegistryError::FrequencyConflict { .. } => ErrorCode::Conflict,
            RegistryError::Busy => ErrorCode::Busy,
            RegistryError::Timeout => ErrorCode::Timeout,
            RegistryError::WorkerBusy => ErrorCode::Busy,
            RegistryError::Unavailable => ErrorCode::Unavailable,
            RegistryError::NotOwner(_) => ErrorCode::Error,
        }
    }
}
