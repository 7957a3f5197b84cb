//! Workspace-wide constants.
//!
//! Single source of truth for the defaults every crate would otherwise
//! have to duplicate, mirroring the teacher workspace's
//! `evo_common::consts` module.

/// Default single-level wildcard token text.
pub const DEFAULT_SINGLE_WILDCARD: &str = "+";

/// Default multi-level wildcard token text.
pub const DEFAULT_MULTI_WILDCARD: &str = "#";

/// Default bounded-queue capacity for a new subscription, absent an
/// explicit override at `NewBus` time.
pub const DEFAULT_SUBSCRIPTION_QUEUE_SIZE: usize = 64;

/// Default bounded-queue capacity for the HAL's device-emitted telemetry
/// channel.
pub const DEFAULT_TELEMETRY_QUEUE_SIZE: usize = 256;

/// Default bounded-queue capacity for a resource registry's per-bus I2C
/// worker.
pub const DEFAULT_I2C_WORKER_QUEUE_SIZE: usize = 16;

/// Default path to the compile-time device list, loaded at HAL startup.
pub const DEFAULT_DEVICES_CONFIG_PATH: &str = "/etc/mchal/devices.toml";

/// Default path to the board's pin/bus map.
pub const DEFAULT_BOARD_CONFIG_PATH: &str = "/etc/mchal/board.toml";

/// Maximum number of channels sharing one PWM slice.
pub const MAX_PWM_CHANNELS_PER_SLICE: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_tokens_are_distinct_and_nonempty() {
        assert!(!DEFAULT_SINGLE_WILDCARD.is_empty());
        assert!(!DEFAULT_MULTI_WILDCARD.is_empty());
        assert_ne!(DEFAULT_SINGLE_WILDCARD, DEFAULT_MULTI_WILDCARD);
    }

    #[test]
    fn queue_sizes_are_nonzero() {
        assert!(DEFAULT_SUBSCRIPTION_QUEUE_SIZE > 0);
        assert!(DEFAULT_TELEMETRY_QUEUE_SIZE > 0);
        assert!(DEFAULT_I2C_WORKER_QUEUE_SIZE > 0);
    }
}
