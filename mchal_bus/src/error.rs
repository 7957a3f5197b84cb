//! Bus-level errors.

use thiserror::Error;
use mchal_types::error::ErrorCode;
use mchal_types::topic::TopicError;

/// Failures raised by bus construction, message construction, and
/// request/reply waits.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// `NewBus` was given wildcard tokens that are empty or not distinct.
    #[error("single and multi wildcard tokens must be non-empty and distinct")]
    InvalidParams,
    /// A topic failed validation: wildcard in a published/retained
    /// topic, wrong control-topic shape, or similar.
    #[error("invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),
    /// `RequestWait` deadline elapsed before a reply arrived.
    #[error("request timed out")]
    Timeout,
    /// `RequestWait` was cancelled before a reply arrived or the deadline
    /// elapsed.
    #[error("request cancelled")]
    Cancelled,
}

impl From<&BusError> for ErrorCode {
    fn from(e: &BusError) -> Self {
        match e {
            BusError::InvalidParams => ErrorCode::InvalidParams,
            BusError::InvalidTopic(_) => ErrorCode::InvalidTopic,
            BusError::Timeout => ErrorCode::Timeout,
            BusError::Cancelled => ErrorCode::Error,
        }
    }
}
