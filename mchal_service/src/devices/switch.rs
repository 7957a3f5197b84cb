//! A single GPIO output switch (scenario S2: sequencing several rail
//! switches through the registry).
//!
//! Grounded on `mchal_registry::pin::GpioHandle` for the claim itself;
//! the device body (control verbs, emitter wiring) has no teacher
//! analogue and follows the device contract directly.

use async_trait::async_trait;

use mchal_types::error::ErrorCode;
use mchal_types::value::Value;
use mchal_types::{CapabilityAddress, DeviceId};

use crate::device::{BuildContext, CapabilitySpec, ControlAck, Device, Emitter};
use crate::error::HalError;
use mchal_registry::{GpioHandle, PinFunction};

/// An on/off GPIO rail. `params`: `pin` (required).
pub struct Switch {
    id: DeviceId,
    caps: Vec<CapabilitySpec>,
    pin: u32,
    gpio: Option<GpioHandle>,
    emitter: Option<Emitter>,
    resources: crate::device::Resources,
}

#[async_trait]
impl Device for Switch {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn capabilities(&self) -> &[CapabilitySpec] {
        &self.caps
    }

    async fn init(&mut self, emitter: Emitter) -> Result<(), HalError> {
        let handle = self
            .resources
            .registry
            .claim_pin(self.id.clone(), self.pin, PinFunction::GPIOOut)?
            .as_gpio();
        handle.write(false);
        emitter.emit_value(self.caps[0].address(), Value::Bool(false));
        self.gpio = Some(handle);
        self.emitter = Some(emitter);
        Ok(())
    }

    fn control(&mut self, _address: &CapabilityAddress, verb: &str, payload: Value) -> (ControlAck, Option<ErrorCode>) {
        let Some(gpio) = &self.gpio else {
            return (ControlAck::Refused(Some(ErrorCode::Unavailable)), None);
        };
        let next = match verb {
            "set" => match payload.as_bool() {
                Some(b) => b,
                None => return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload)),
            },
            "toggle" => !gpio.read(),
            _ => return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload)),
        };
        gpio.write(next);
        if let Some(emitter) = &self.emitter {
            emitter.emit_value(self.caps[0].address(), Value::Bool(next));
        }
        (ControlAck::Accepted, None)
    }

    async fn close(&mut self) -> Result<(), HalError> {
        if self.gpio.take().is_some() {
            self.resources.registry.release_pin(&self.id, self.pin);
        }
        Ok(())
    }
}

pub(crate) fn build(ctx: BuildContext) -> Result<Box<dyn Device>, HalError> {
    let pin = super::param_u32(&ctx.params, "pin").ok_or_else(|| super::missing_param(ctx.id.as_str(), "pin"))?;
    let name = super::param_str(&ctx.params, "name").unwrap_or_else(|| ctx.id.as_str().to_string());
    let caps = vec![CapabilitySpec::new("io", "switch", name, Value::map([("pin", Value::U64(pin as u64))]))];
    Ok(Box::new(Switch {
        id: ctx.id,
        caps,
        pin,
        gpio: None,
        emitter: None,
        resources: ctx.resources,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Resources;
    use mchal_registry::{Registry, ResourcePlan};
    use mchal_ring::RingTable;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn ctx(id: &str, pin: u32) -> BuildContext {
        let mut params = toml::Table::new();
        params.insert("pin".to_string(), toml::Value::Integer(pin as i64));
        BuildContext {
            id: DeviceId::from(id),
            device_type: "switch".to_string(),
            params,
            resources: Resources {
                registry: Arc::new(Registry::new(ResourcePlan::simple(8))),
                ring_table: Arc::new(RingTable::new()),
            },
        }
    }

    #[tokio::test]
    async fn set_and_toggle_drive_the_pin() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut device = build(ctx("rail1", 0)).unwrap();
        device.init(Emitter::new(tx)).await.unwrap();
        rx.try_recv().unwrap();

        let addr = CapabilityAddress::new("io", "switch", "rail1");
        let (ack, err) = device.control(&addr, "set", Value::Bool(true));
        assert_eq!(ack, ControlAck::Accepted);
        assert!(err.is_none());
        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload, Some(Value::Bool(true)));

        let (ack, _) = device.control(&addr, "toggle", Value::Unit);
        assert_eq!(ack, ControlAck::Accepted);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload, Some(Value::Bool(false)));
    }

    #[tokio::test]
    async fn missing_pin_param_fails_build() {
        let resources = Resources {
            registry: Arc::new(Registry::new(ResourcePlan::simple(4))),
            ring_table: Arc::new(RingTable::new()),
        };
        let ctx = BuildContext {
            id: DeviceId::from("rail1"),
            device_type: "switch".to_string(),
            params: toml::Table::new(),
            resources,
        };
        assert!(matches!(build(ctx), Err(HalError::BuildFailed { .. })));
    }
}
