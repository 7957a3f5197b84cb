//! Built-in example devices (external collaborators per the device
//! contract) plus their registration with a [`crate::builder::DeviceBuilderRegistry`].
//!
//! Grounded on `evo_hal::drivers::mod.rs`'s `register_builtin_drivers`
//! shape: one free function registering every built-in factory by name,
//! called once from `main` before the first config is applied.

mod env_sensor;
mod pwm_led;
mod serial_session;
mod switch;

use crate::builder::DeviceBuilderRegistry;
use crate::error::HalError;

fn param_u32(params: &toml::Table, key: &str) -> Option<u32> {
    params.get(key)?.as_integer().and_then(|v| u32::try_from(v).ok())
}

fn param_u64(params: &toml::Table, key: &str) -> Option<u64> {
    params.get(key)?.as_integer().and_then(|v| u64::try_from(v).ok())
}

fn param_u8(params: &toml::Table, key: &str) -> Option<u8> {
    params.get(key)?.as_integer().and_then(|v| u8::try_from(v).ok())
}

fn param_str(params: &toml::Table, key: &str) -> Option<String> {
    params.get(key)?.as_str().map(str::to_string)
}

fn param_bool(params: &toml::Table, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn missing_param(id: &str, key: &str) -> HalError {
    HalError::BuildFailed {
        id: id.to_string(),
        reason: format!("missing or invalid parameter '{key}'"),
    }
}

/// Register every built-in device builder by type string.
pub fn register_builtin_devices(registry: &mut DeviceBuilderRegistry) {
    registry.register("switch", switch::build);
    registry.register("pwm_led", pwm_led::build);
    registry.register("env_sensor", env_sensor::build);
    registry.register("serial_session", serial_session::build);
}
