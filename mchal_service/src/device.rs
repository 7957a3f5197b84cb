//! The device contract (§4.E): the uniform interface every capability
//! owner implements, plus the emitter devices use to report telemetry
//! back to the HAL service's single publisher task.
//!
//! Grounded on `evo_common::hal::driver::HalDriver` for the trait's
//! overall shape (required id/init/cycle-equivalent/shutdown methods,
//! a few methods with default no-op bodies), generalized to `async fn`
//! per the `other_examples` DrMem `driver::API` trait — the teacher's own
//! `HalDriver` is synchronous because it fits a fixed-rate RT loop, not
//! this spec's cooperative event loop where `init`/`close` may need to
//! await resource teardown (e.g. a ramp task, a session reactor).
//! `control` stays a plain, non-async method: the contract requires it
//! never block the HAL service's single loop, and forcing it through
//! `async fn` would invite accidental `.await`s on slow work.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::mpsc;

use mchal_types::error::ErrorCode;
use mchal_types::value::Value;
use mchal_types::{CapabilityAddress, DeviceId};

use crate::error::HalError;

/// Static capability metadata declared by a device at build time.
///
/// `info` is published retained, verbatim, on the capability's `info`
/// topic as soon as the device is registered.
#[derive(Debug, Clone)]
pub struct CapabilitySpec {
    /// Coarse category, e.g. `io`, `power`, `env`.
    pub domain: String,
    /// Finer category, e.g. `led`, `switch`, `temperature`.
    pub kind: String,
    /// Instance identifier chosen at configuration time.
    pub name: String,
    /// Static metadata published retained on `.../info`.
    pub info: Value,
}

impl CapabilitySpec {
    /// Build a new capability spec.
    pub fn new(domain: impl Into<String>, kind: impl Into<String>, name: impl Into<String>, info: Value) -> Self {
        CapabilitySpec {
            domain: domain.into(),
            kind: kind.into(),
            name: name.into(),
            info,
        }
    }

    /// The capability's `(domain, kind, name)` address.
    pub fn address(&self) -> CapabilityAddress {
        CapabilityAddress::new(self.domain.clone(), self.kind.clone(), self.name.clone())
    }
}

/// A telemetry event emitted by a device, drained by the HAL service's
/// single publisher task.
///
/// Exactly one of `payload`/`error` drives what the service publishes:
/// an event with `error` set publishes a degraded `status` and nothing
/// else; otherwise the service publishes either `event`[/tag] (if
/// `is_event`) or `value`, followed by an `up` `status`.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    /// The capability this event belongs to.
    pub address: CapabilityAddress,
    /// The payload to publish, if any.
    pub payload: Option<Value>,
    /// Milliseconds since the Unix epoch, best-effort.
    pub timestamp_ms: u64,
    /// An error code, if this emission represents a fault.
    pub error: Option<ErrorCode>,
    /// An optional tag appended to the `event` topic (`event/<tag>`).
    pub tag: Option<String>,
    /// `true` for a non-retained edge `event`; `false` for a retained
    /// `value` sample. Ignored when `error` is set.
    pub is_event: bool,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A HAL-provided handle devices use to report telemetry without
/// blocking. Cheap to clone; every clone shares the same bounded channel
/// to the HAL service's publisher task.
///
/// Not bound to any one capability: a device declaring two or more
/// capabilities (§2, "owns one or more capabilities") passes the address
/// of whichever capability the sample belongs to at each call, rather
/// than being handed a separate emitter per capability.
#[derive(Clone)]
pub struct Emitter {
    sender: mpsc::Sender<TelemetryEvent>,
}

impl Emitter {
    pub(crate) fn new(sender: mpsc::Sender<TelemetryEvent>) -> Self {
        Emitter { sender }
    }

    /// Emit a new sample for `address`: publishes retained `value` then
    /// retained `status = up`. Returns `false` (and drops the event) if
    /// the telemetry channel is full — callers may coalesce or retry,
    /// per the emission contract.
    pub fn emit_value(&self, address: CapabilityAddress, payload: Value) -> bool {
        self.send(TelemetryEvent {
            address,
            payload: Some(payload),
            timestamp_ms: now_ms(),
            error: None,
            tag: None,
            is_event: false,
        })
    }

    /// Emit an edge event for `address`: publishes non-retained
    /// `event`[/tag] then retained `status = up`.
    pub fn emit_event(&self, address: CapabilityAddress, payload: Option<Value>, tag: Option<String>) -> bool {
        self.send(TelemetryEvent {
            address,
            payload,
            timestamp_ms: now_ms(),
            error: None,
            tag,
            is_event: true,
        })
    }

    /// Emit a fault for `address`: publishes retained `status = degraded`
    /// with `error` and publishes neither `value` nor `event`.
    pub fn emit_error(&self, address: CapabilityAddress, error: ErrorCode) -> bool {
        self.send(TelemetryEvent {
            address,
            payload: None,
            timestamp_ms: now_ms(),
            error: Some(error),
            tag: None,
            is_event: false,
        })
    }

    fn send(&self, event: TelemetryEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// The outcome of a control invocation's enqueue step, separate from
/// `error` (§4.D): a control call either accepts the request for
/// asynchronous processing or refuses it, optionally with a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAck {
    /// The device enqueued the request for asynchronous handling.
    Accepted,
    /// The device refused the request, optionally with a specific
    /// reason. `None` maps to [`ErrorCode::Busy`] at reply time.
    Refused(Option<ErrorCode>),
}

/// Every device implements this contract (§4.E). Individual device
/// *bodies* (register sequences, simulated or real) are external
/// collaborators; only the shape is frozen here.
#[async_trait]
pub trait Device: Send {
    /// Stable identity, used for resource claims and log lines.
    fn id(&self) -> &DeviceId;

    /// Declared capabilities. Fixed at construction; never changes.
    fn capabilities(&self) -> &[CapabilitySpec];

    /// Acquire any claims not already reserved at build time, configure
    /// per-capability addresses, and optionally publish an initial
    /// retained value via `emitter` if that can be done without
    /// blocking. `async` so a device may await claim setup (e.g. an I2C
    /// probe read) before returning.
    async fn init(&mut self, emitter: Emitter) -> Result<(), HalError>;

    /// Handle one control invocation. **Must not block**: devices enqueue
    /// work onto their own resources and report results asynchronously
    /// via their [`Emitter`].
    fn control(&mut self, address: &CapabilityAddress, verb: &str, payload: Value) -> (ControlAck, Option<ErrorCode>);

    /// Stop internal tasks and release claims. Called once, at HAL
    /// shutdown, best-effort (errors are logged, not propagated further).
    async fn close(&mut self) -> Result<(), HalError>;
}

/// Shared collaborators every device builder receives: the resource
/// registry and the ring handle table, both process-wide for this boot.
#[derive(Clone)]
pub struct Resources {
    /// The resource registry (Component C).
    pub registry: Arc<mchal_registry::Registry>,
    /// The process-wide ring handle table (Component A).
    pub ring_table: Arc<mchal_ring::RingTable>,
}

/// Everything a [`crate::builder::DeviceBuilder`] factory needs to build
/// one device instance.
pub struct BuildContext {
    /// The device id assigned in its config record.
    pub id: DeviceId,
    /// The device `type` string that selected this builder.
    pub device_type: String,
    /// This device's `params` table from its config record.
    pub params: toml::Table,
    /// Shared resource collaborators.
    pub resources: Resources,
}
