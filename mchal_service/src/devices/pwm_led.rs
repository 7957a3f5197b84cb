//! A PWM-driven dimmable LED (scenario S5: ramp start then `set_level`
//! cancels it before its natural end).
//!
//! Grounded on `mchal_registry::pwm::PwmHandle` for the claim and ramp
//! primitives; the control-verb dispatch is new, following the same
//! shape as [`super::switch::Switch`].

use async_trait::async_trait;

use mchal_types::error::ErrorCode;
use mchal_types::value::{Fixed, Value};
use mchal_types::{CapabilityAddress, DeviceId};

use crate::device::{BuildContext, CapabilitySpec, ControlAck, Device, Emitter};
use crate::error::HalError;
use mchal_registry::{PinFunction, PwmHandle, RampMode};

/// A dimmable PWM output. `params`: `pin` (required), `frequency_hz`
/// (default 1000).
pub struct PwmLed {
    id: DeviceId,
    caps: Vec<CapabilitySpec>,
    pin: u32,
    frequency_hz: u32,
    pwm: Option<PwmHandle>,
    emitter: Option<Emitter>,
    resources: crate::device::Resources,
}

fn level_as_fixed(level: u32, top: u32) -> Value {
    if top == 0 {
        return Value::Fixed(Fixed::from_int(0));
    }
    let raw = ((level as i64 * Fixed::SCALE as i64) / top as i64) as i32;
    Value::Fixed(Fixed::from_raw(raw))
}

impl PwmLed {
    fn emit_level(&self) {
        if let (Some(pwm), Some(emitter)) = (&self.pwm, &self.emitter) {
            emitter.emit_value(self.caps[0].address(), level_as_fixed(pwm.level(), pwm.top()));
        }
    }
}

#[async_trait]
impl Device for PwmLed {
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
            .claim_pin(self.id.clone(), self.pin, PinFunction::PWM)?
            .as_pwm();
        handle.configure_frequency(self.frequency_hz)?;
        handle.set_level(0);
        self.pwm = Some(handle);
        self.emitter = Some(emitter);
        self.emit_level();
        Ok(())
    }

    fn control(&mut self, _address: &CapabilityAddress, verb: &str, payload: Value) -> (ControlAck, Option<ErrorCode>) {
        let Some(pwm) = &self.pwm else {
            return (ControlAck::Refused(Some(ErrorCode::Unavailable)), None);
        };
        match verb {
            "set_level" => {
                let Some(level) = payload.as_fixed() else {
                    return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload));
                };
                let scaled = (level.raw() as i64 * pwm.top() as i64 / Fixed::SCALE as i64).clamp(0, pwm.top() as i64);
                pwm.set_level(scaled as u32);
            }
            "ramp" => {
                let (Some(target), Some(duration_ms), Some(steps)) = (
                    payload.field("target").and_then(Value::as_fixed),
                    payload.field("duration_ms").and_then(Value::as_u64),
                    payload.field("steps").and_then(Value::as_u64),
                ) else {
                    return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload));
                };
                let scaled = (target.raw() as i64 * pwm.top() as i64 / Fixed::SCALE as i64).clamp(0, pwm.top() as i64);
                if let Err(e) = pwm.ramp(scaled as u32, duration_ms, steps as u32, RampMode::Linear) {
                    return (ControlAck::Refused(None), Some(ErrorCode::from(&e)));
                }
            }
            "stop_ramp" => pwm.stop_ramp(),
            _ => return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload)),
        }
        self.emit_level();
        (ControlAck::Accepted, None)
    }

    async fn close(&mut self) -> Result<(), HalError> {
        if let Some(pwm) = self.pwm.take() {
            pwm.release();
            self.resources.registry.release_pin(&self.id, self.pin);
        }
        Ok(())
    }
}

pub(crate) fn build(ctx: BuildContext) -> Result<Box<dyn Device>, HalError> {
    let pin = super::param_u32(&ctx.params, "pin").ok_or_else(|| super::missing_param(ctx.id.as_str(), "pin"))?;
    let frequency_hz = super::param_u32(&ctx.params, "frequency_hz").unwrap_or(1000);
    let name = super::param_str(&ctx.params, "name").unwrap_or_else(|| ctx.id.as_str().to_string());
    let caps = vec![CapabilitySpec::new(
        "power",
        "led",
        name,
        Value::map([("pin", Value::U64(pin as u64)), ("frequency_hz", Value::U64(frequency_hz as u64))]),
    )];
    Ok(Box::new(PwmLed {
        id: ctx.id,
        caps,
        pin,
        frequency_hz,
        pwm: None,
        emitter: None,
        resources: ctx.resources,
    }))
}
