//! The closed bus-level error-code set.
//!
//! Internal crate errors (`RingError`, `BusError`, `RegistryError`,
//! `HalError`) are richer and carry context; at the point a reply is
//! constructed each maps down to one of these codes. The set is closed —
//! adding a variant is a breaking change to every client that matches on
//! it, so new failure modes should be mapped onto the closest existing
//! code rather than extending this enum casually.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed error-code set carried in control replies and capability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Success. Not actually an error; included so `{ok: false, error}`
    /// replies and `{ok: true}` replies share one wire representation if
    /// a caller chooses to always populate `error`.
    #[error("ok")]
    Ok,
    /// Resource or worker temporarily unable to accept the operation.
    #[error("busy")]
    Busy,
    /// A deadline elapsed before completion.
    #[error("timeout")]
    Timeout,
    /// Resource already held by another owner, or incompatible
    /// configuration requested (e.g. mismatched PWM slice frequency).
    #[error("conflict")]
    Conflict,
    /// Requested function cannot be realised (e.g. PWM on a pin with no
    /// slice).
    #[error("unsupported")]
    Unsupported,
    /// Pin number outside the board's allowed range.
    #[error("unknown_pin")]
    UnknownPin,
    /// Pin already claimed by another device.
    #[error("pin_in_use")]
    PinInUse,
    /// Bus id not present in the compile-time bus plan.
    #[error("unknown_bus")]
    UnknownBus,
    /// Capability address not present in the HAL's capability index.
    #[error("unknown_capability")]
    UnknownCapability,
    /// Payload does not match the verb's expected shape.
    #[error("invalid_payload")]
    InvalidPayload,
    /// Parameters fail validation (e.g. non-power-of-two ring size).
    #[error("invalid_params")]
    InvalidParams,
    /// Topic malformed: wrong token count, non-text token where text
    /// required, or a wildcard used in a context that forbids it.
    #[error("invalid_topic")]
    InvalidTopic,
    /// Control message received before the HAL has applied any config.
    #[error("hal_not_ready")]
    HALNotReady,
    /// Resource exists but is not currently usable (e.g. closed session).
    #[error("unavailable")]
    Unavailable,
    /// Generic fallback for failures with no more specific code.
    #[error("error")]
    Error,
}

impl ErrorCode {
    /// `true` for [`ErrorCode::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, ErrorCode::Ok)
    }
}
