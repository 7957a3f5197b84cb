//! # mchal_registry
//!
//! Component C: arbitration of exclusive hardware resources — pins by
//! number, I2C buses by id (with a per-bus serialisation worker task),
//! UART ports by id (single owner), and PWM slice+channel pairs (with a
//! frequency-compatibility policy shared across up to two channels and
//! cooperative ramp cancellation).
//!
//! Grounded structurally on `evo_common::io::registry::IoRegistry`
//! (build-once, validate, `HashMap<Key, Binding>`, O(1) runtime lookup)
//! and `evo_common::hal::driver::HalError`'s `thiserror`-wrapping-context
//! style for [`RegistryError`]; the per-bus worker task is grounded on
//! the `other_examples` DrMem request/reply corpus, since the teacher
//! accesses I2C hardware directly inside a single RT loop rather than
//! through a serialising worker.

#![warn(missing_docs)]

mod error;
mod i2c;
mod pin;
mod plan;
mod pwm;
mod registry;
mod serial;

pub use error::RegistryError;
pub use i2c::I2cTransport;
pub use pin::{GpioHandle, PinFunction, PinHandle};
pub use plan::{PinPlan, ResourcePlan};
pub use pwm::{PwmHandle, RampMode};
pub use registry::Registry;
pub use serial::{Parity, SerialFormat, SerialPort};
