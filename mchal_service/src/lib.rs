//! # mchal_service
//!
//! Components D and E: the device contract every capability owner
//! implements, and the HAL service event loop that builds devices from
//! configuration, indexes their capabilities, and is the sole writer of
//! capability state on the bus.

#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod device;
pub mod devices;
pub mod error;
pub mod service;

pub use builder::DeviceBuilderRegistry;
pub use config::{BoardConfig, ConfigError, ConfigLoader, DeviceRecord, DevicesConfig};
pub use device::{CapabilitySpec, ControlAck, Device, Emitter, Resources, TelemetryEvent};
pub use devices::register_builtin_devices;
pub use error::HalError;
pub use service::HalService;
