//! HAL service errors.

use thiserror::Error;

use mchal_bus::BusError;
use mchal_registry::RegistryError;
use mchal_ring::RingError;
use mchal_types::error::ErrorCode;

/// Failures raised by device construction, configuration loading, and the
/// service's own startup/shutdown path.
///
/// Per §7's resolved Open Question (see `DESIGN.md`): a `Fatal` error
/// encountered while applying the *first* config (i.e. before the
/// service has ever reached `ready`) halts the service. The same error
/// kind encountered while applying a config update after `ready` is
/// logged and the offending device record is skipped instead — that
/// policy lives in [`crate::service::HalService`], not here.
#[derive(Debug, Error)]
pub enum HalError {
    /// A device record named a `type` with no registered builder.
    #[error("no device builder registered for type '{0}'")]
    UnknownDeviceType(String),
    /// A builder's factory function failed.
    #[error("device '{id}' failed to build: {reason}")]
    BuildFailed {
        /// The device id that failed to build.
        id: String,
        /// The builder's failure reason.
        reason: String,
    },
    /// A device's `init` returned an error.
    #[error("device '{id}' failed to initialize: {reason}")]
    InitFailed {
        /// The device id that failed to initialize.
        id: String,
        /// The init failure reason.
        reason: String,
    },
    /// Resource claim failed during device build.
    #[error("resource claim failed: {0}")]
    Resource(#[from] RegistryError),
    /// A ring operation failed during device build (e.g. session setup).
    #[error("ring error: {0}")]
    Ring(#[from] RingError),
    /// Loading or parsing `devices.toml` / `board.toml` failed.
    #[error("configuration error: {0}")]
    Config(String),
    /// A bus operation failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    /// A device config record's payload did not have the expected shape.
    #[error("invalid config record: {0}")]
    InvalidConfigRecord(String),
}

impl From<&HalError> for ErrorCode {
    fn from(e: &HalError) -> Self {
        match e {
            HalError::UnknownDeviceType(_) => ErrorCode::InvalidParams,
            HalError::BuildFailed { .. } => ErrorCode::Error,
            HalError::InitFailed { .. } => ErrorCode::Error,
            HalError::Resource(re) => ErrorCode::from(re),
            HalError::Ring(_) => ErrorCode::InvalidParams,
            HalError::Config(_) => ErrorCode::InvalidParams,
            HalError::Bus(be) => ErrorCode::from(be),
            HalError::InvalidConfigRecord(_) => ErrorCode::InvalidPayload,
        }
    }
}
