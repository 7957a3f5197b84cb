//! Capability link state.

use serde::{Deserialize, Serialize};

/// A capability's health summary, published retained on its `status`
/// topic.
///
/// Initial state on registration is [`LinkState::Down`]. A successful
/// value or event emission moves it to [`LinkState::Up`]; an emission
/// carrying an error code moves it to [`LinkState::Degraded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No successful emission has occurred yet.
    Down,
    /// Most recent emission succeeded.
    Up,
    /// Most recent emission carried an error code.
    Degraded,
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState::Down
    }
}
