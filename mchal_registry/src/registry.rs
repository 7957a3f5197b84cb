//! The resource registry: claim/release operations and orderly shutdown.
//!
//! Grounded structurally on `evo_common::io::registry::IoRegistry` — a
//! `HashMap`-backed map built from a compile-time plan, guarded by a
//! short-critical-section lock for claim/release, with O(1) runtime
//! lookup for the data-path accessors that live on the handles
//! themselves rather than on the registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use mchal_types::DeviceId;

use crate::error::RegistryError;
use crate::i2c::{I2cTransport, I2cWorker};
use crate::pin::{GpioHandle, PinFunction, PinHandle};
use crate::plan::{PinPlan, ResourcePlan};
use crate::pwm::{PwmHandle, SliceState};
use crate::serial::SerialPort;

struct PinClaim {
    owner: DeviceId,
    function: PinFunction,
}

struct State {
    pins: HashMap<u32, PinPlan>,
    pin_claims: HashMap<u32, PinClaim>,
    slices: HashMap<u32, Arc<Mutex<SliceState>>>,
    i2c_claims: HashMap<u32, u32>,
    uart_owners: HashMap<u32, DeviceId>,
}

/// Arbitrates exclusive access to pins, I2C buses, UART ports, and PWM
/// slices, and owns the per-bus I2C worker tasks and UART port
/// simulators built from the board's [`ResourcePlan`].
pub struct Registry {
    state: Mutex<State>,
    i2c_workers: HashMap<u32, I2cWorker>,
    uart_ports: HashMap<u32, Arc<SerialPort>>,
}

impl Registry {
    /// Build a registry from the board's static resource plan, spawning
    /// one I2C worker task per bus and one simulated UART port per
    /// configured port id.
    pub fn new(plan: ResourcePlan) -> Self {
        let pins = plan.pins.iter().map(|p| (p.number, p.clone())).collect();
        let i2c_workers = plan
            .i2c_buses
            .iter()
            .map(|&bus| (bus, I2cWorker::spawn(mchal_types::consts::DEFAULT_I2C_WORKER_QUEUE_SIZE)))
            .collect();
        let uart_ports = plan
            .uart_ports
            .iter()
            .map(|&port| (port, Arc::new(SerialPort::new(port, true))))
            .collect();

        Registry {
            state: Mutex::new(State {
                pins,
                pin_claims: HashMap::new(),
                slices: HashMap::new(),
                i2c_claims: HashMap::new(),
                uart_owners: HashMap::new(),
            }),
            i2c_workers,
            uart_ports,
        }
    }

    /// Claim a pin for `function`. Fails `UnknownPin` if outside the
    /// board's range, `PinInUse` if already claimed, or `Unsupported` if
    /// the function cannot be realised on that pin.
    pub fn claim_pin(
        &self,
        device_id: DeviceId,
        pin_number: u32,
        function: PinFunction,
    ) -> Result<PinHandle, RegistryError> {
        let mut state = self.state.lock();
        let plan = state.pins.get(&pin_number).cloned().ok_or_else(|| {
            warn!(pin = pin_number, "claim rejected: pin not in the board's resource plan");
            RegistryError::UnknownPin(pin_number)
        })?;

        if let Some(existing) = state.pin_claims.get(&pin_number) {
            warn!(pin = pin_number, owner = %existing.owner, requester = %device_id, "pin claim conflict");
            return Err(RegistryError::PinInUse {
                pin: pin_number,
                owner: existing.owner.clone(),
            });
        }

        let handle = match function {
            PinFunction::GPIOIn | PinFunction::GPIOOut => PinHandle::Gpio(GpioHandle::new(pin_number, function)),
            PinFunction::PWM => {
                let (slice, channel) = plan.pwm.ok_or(RegistryError::Unsupported(pin_number))?;
                let slice_state = state
                    .slices
                    .entry(slice)
                    .or_insert_with(|| Arc::new(Mutex::new(SliceState::new())))
                    .clone();
                PinHandle::Pwm(PwmHandle::new(pin_number, slice, channel, false, 4095, slice_state))
            }
        };

        info!(pin = pin_number, owner = %device_id, ?function, "pin claim granted");
        state.pin_claims.insert(
            pin_number,
            PinClaim {
                owner: device_id,
                function,
            },
        );
        Ok(handle)
    }

    /// Release a pin claim. A no-op (per contract) if `device_id` is not
    /// the current owner. The final state always restores the pin to
    /// input; a PWM release additionally stops any ramp and drives duty
    /// to zero (handled by the caller dropping/releasing its
    /// [`PwmHandle`] before calling this — the registry only clears
    /// ownership bookkeeping here since the handle itself owns the
    /// hardware-facing state).
    pub fn release_pin(&self, device_id: &DeviceId, pin_number: u32) {
        let mut state = self.state.lock();
        if let Some(claim) = state.pin_claims.get(&pin_number) {
            if &claim.owner == device_id {
                state.pin_claims.remove(&pin_number);
                info!(pin = pin_number, owner = %device_id, "pin claim released");
            }
        }
    }

    /// Claim a shared I2C transport for `bus_id`. Reference-counted:
    /// multiple devices may claim the same bus, serialised by its
    /// worker.
    pub fn claim_i2c(&self, _device_id: DeviceId, bus_id: u32) -> Result<I2cTransport, RegistryError> {
        let worker = self
            .i2c_workers
            .get(&bus_id)
            .ok_or(RegistryError::UnknownBus(bus_id))?;
        *self.state.lock().i2c_claims.entry(bus_id).or_insert(0) += 1;
        Ok(worker.transport.clone())
    }

    /// Release an I2C claim. Accounting-only: does not affect the
    /// worker, which lives for the registry's lifetime.
    pub fn release_i2c(&self, bus_id: u32) {
        let mut state = self.state.lock();
        if let Some(count) = state.i2c_claims.get_mut(&bus_id) {
            *count = count.saturating_sub(1);
        }
    }

    /// Claim a UART port. Single-owner: fails `Conflict` if already held
    /// by another device.
    pub fn claim_serial(&self, device_id: DeviceId, bus_id: u32) -> Result<Arc<SerialPort>, RegistryError> {
        let port = self
            .uart_ports
            .get(&bus_id)
            .cloned()
            .ok_or(RegistryError::UnknownBus(bus_id))?;
        let mut state = self.state.lock();
        if let Some(owner) = state.uart_owners.get(&bus_id) {
            warn!(bus = bus_id, owner = %owner, requester = %device_id, "serial claim conflict");
            return Err(RegistryError::Conflict(owner.clone()));
        }
        info!(bus = bus_id, owner = %device_id, "serial claim granted");
        state.uart_owners.insert(bus_id, device_id);
        Ok(port)
    }

    /// Release a UART claim. A no-op if `device_id` is not the current
    /// owner.
    pub fn release_serial(&self, device_id: &DeviceId, bus_id: u32) {
        let mut state = self.state.lock();
        if let Some(owner) = state.uart_owners.get(&bus_id) {
            if owner == device_id {
                state.uart_owners.remove(&bus_id);
            }
        }
    }

    /// Stop every worker task. Called once, during HAL shutdown, after
    /// every device has been closed.
    pub fn close(&self) {
        for worker in self.i2c_workers.values() {
            worker.stop();
        }
    }
}
