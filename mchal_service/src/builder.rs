//! Device builder registry.
//!
//! Grounded directly on `evo_hal::driver_registry::DriverRegistry`:
//! constructor-injected (no global state, testable in isolation),
//! `HashMap<&'static str, Factory>`, `register` panics on a duplicate
//! name (a programming error per spec §4.D: "duplicate registration is a
//! programming error"). The teacher additionally keeps a legacy
//! `LazyLock`-backed global shim alongside its constructor-injected
//! registry for migration purposes; that shim has no counterpart here —
//! this is a new workspace, not a migration, so only the constructor-
//! injected form is carried over.

use std::collections::HashMap;

use crate::device::{BuildContext, Device};
use crate::error::HalError;

/// Factory function building one device instance from a [`BuildContext`].
pub type DeviceBuilder = fn(BuildContext) -> Result<Box<dyn Device>, HalError>;

/// Registry of device builders, keyed by the config record's `type`
/// string. Built once at startup, passed to [`crate::service::HalService`]
/// by value.
pub struct DeviceBuilderRegistry {
    builders: HashMap<&'static str, DeviceBuilder>,
}

impl DeviceBuilderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        DeviceBuilderRegistry {
            builders: HashMap::new(),
        }
    }

    /// Register a builder for `type_name`.
    ///
    /// # Panics
    /// Panics if a builder is already registered under `type_name` — a
    /// programming error per the device-contract spec, not a runtime
    /// condition.
    pub fn register(&mut self, type_name: &'static str, builder: DeviceBuilder) {
        if self.builders.contains_key(type_name) {
            panic!("device builder '{type_name}' is already registered");
        }
        self.builders.insert(type_name, builder);
    }

    /// Build a device from `ctx`, dispatching on `ctx.device_type`.
    pub fn build(&self, ctx: BuildContext) -> Result<Box<dyn Device>, HalError> {
        let factory = self
            .builders
            .get(ctx.device_type.as_str())
            .copied()
            .ok_or_else(|| HalError::UnknownDeviceType(ctx.device_type.clone()))?;
        factory(ctx)
    }

    /// List every registered device type name.
    pub fn list_types(&self) -> Vec<&'static str> {
        self.builders.keys().copied().collect()
    }
}

impl Default for DeviceBuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CapabilitySpec, ControlAck, Emitter};
    use async_trait::async_trait;
    use mchal_types::error::ErrorCode;
    use mchal_types::value::Value;
    use mchal_types::{CapabilityAddress, DeviceId};

    struct NoopDevice {
        id: DeviceId,
        caps: Vec<CapabilitySpec>,
    }

    #[async_trait]
    impl Device for NoopDevice {
        fn id(&self) -> &DeviceId {
            &self.id
        }
        fn capabilities(&self) -> &[CapabilitySpec] {
            &self.caps
        }
        async fn init(&mut self, _emitter: Emitter) -> Result<(), HalError> {
            Ok(())
        }
        fn control(&mut self, _a: &CapabilityAddress, _v: &str, _p: Value) -> (ControlAck, Option<ErrorCode>) {
            (ControlAck::Accepted, None)
        }
        async fn close(&mut self) -> Result<(), HalError> {
            Ok(())
        }
    }

    fn make_noop(ctx: BuildContext) -> Result<Box<dyn Device>, HalError> {
        Ok(Box::new(NoopDevice { id: ctx.id, caps: vec![] }))
    }

    #[test]
    fn register_and_build() {
        let mut reg = DeviceBuilderRegistry::new();
        reg.register("noop", make_noop);
        assert_eq!(reg.list_types(), vec!["noop"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut reg = DeviceBuilderRegistry::new();
        reg.register("noop", make_noop);
        reg.register("noop", make_noop);
    }

    #[test]
    fn build_unknown_type_fails() {
        let reg = DeviceBuilderRegistry::new();
        let resources = crate::device::Resources {
            registry: std::sync::Arc::new(mchal_registry::Registry::new(mchal_registry::ResourcePlan::simple(1))),
            ring_table: std::sync::Arc::new(mchal_ring::RingTable::new()),
        };
        let ctx = BuildContext {
            id: DeviceId::from("d1"),
            device_type: "nonexistent".into(),
            params: toml::Table::new(),
            resources,
        };
        assert!(matches!(reg.build(ctx), Err(HalError::UnknownDeviceType(_))));
    }
}
