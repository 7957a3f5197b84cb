//! Errors raised by the ring and its handle table.

use thiserror::Error;

/// Failures raised by [`crate::Ring::new`] and the handle table.
///
/// The ring's data-path operations (`write_acquire`/`write_commit`/
/// `read_acquire`/`read_release`) never fail: all validation happens once,
/// at construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RingError {
    /// `new(size)` was called with a size that is not a power of two, or
    /// is smaller than two.
    #[error("ring capacity {0} must be a power of two >= 2")]
    InvalidParams(usize),
    /// A handle was not found in the ring table, either because it was
    /// never issued or because it was already closed/taken.
    #[error("unknown or already-closed ring handle {0}")]
    UnknownHandle(u32),
}
