//! The HAL event loop (§4.D): the single writer of capability state on
//! the bus.
//!
//! Grounded on `evo_hal::core::HalCore::run`'s overall shape — one task,
//! one loop, periodic state transitions driven by what arrives — but the
//! teacher's loop is cycle-driven (`while running { read_commands();
//! driver.cycle(); write_status(); sleep(period) }`); this loop is
//! event-driven instead (`tokio::select!` over four message sources),
//! since the device contract here has no fixed-rate analog to `cycle`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use mchal_bus::{Connection, Message};
use mchal_registry::Registry;
use mchal_ring::RingTable;
use mchal_types::consts::DEFAULT_TELEMETRY_QUEUE_SIZE;
use mchal_types::error::ErrorCode;
use mchal_types::link::LinkState;
use mchal_types::value::Value;
use mchal_types::{CapabilityAddress, DeviceId, Token, Topic};

use crate::builder::DeviceBuilderRegistry;
use crate::config::{device_records_to_value, value_to_device_records, DeviceRecord};
use crate::device::{now_ms, BuildContext, ControlAck, Device, Emitter, Resources, TelemetryEvent};
use crate::error::HalError;

fn cap_topic(addr: &CapabilityAddress, suffix: &str) -> Topic {
    addr.base_topic().join([Token::text(suffix)])
}

fn link_text(link: LinkState) -> &'static str {
    match link {
        LinkState::Down => "down",
        LinkState::Up => "up",
        LinkState::Degraded => "degraded",
    }
}

fn status_value(link: LinkState, error: Option<ErrorCode>) -> Value {
    let mut fields = vec![
        ("link".to_string(), Value::Text(link_text(link).to_string())),
        ("ts".to_string(), Value::U64(now_ms())),
    ];
    if let Some(err) = error {
        fields.push(("error".to_string(), Value::Error(err)));
    }
    Value::Map(fields.into_iter().collect())
}

/// The HAL service: owns the device map, the capability index, and the
/// only task permitted to publish capability state.
pub struct HalService {
    conn: Connection,
    registry: Arc<Registry>,
    ring_table: Arc<RingTable>,
    builders: DeviceBuilderRegistry,
    devices: HashMap<DeviceId, Box<dyn Device>>,
    capability_index: HashMap<CapabilityAddress, DeviceId>,
    telemetry_tx: mpsc::Sender<TelemetryEvent>,
    ready: bool,
}

impl HalService {
    /// Construct a service over an already-open bus connection and
    /// already-built resource collaborators. Returns the telemetry
    /// receiver separately (see [`crate::service`] module docs) so that
    /// [`Self::run`] can select over it without the borrow conflict of
    /// holding both halves of the channel as fields of the same struct.
    pub fn new(
        conn: Connection,
        registry: Arc<Registry>,
        ring_table: Arc<RingTable>,
        builders: DeviceBuilderRegistry,
    ) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (telemetry_tx, telemetry_rx) = mpsc::channel(DEFAULT_TELEMETRY_QUEUE_SIZE);
        (
            HalService {
                conn,
                registry,
                ring_table,
                builders,
                devices: HashMap::new(),
                capability_index: HashMap::new(),
                telemetry_tx,
                ready: false,
            },
            telemetry_rx,
        )
    }

    /// `true` once at least one configuration has been applied.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of devices currently built.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Startup step 2: publish the compile-time device list retained on
    /// `config/hal`, before subscribing to it — the subscribe performed
    /// at the top of [`Self::run`] replays this retained message as the
    /// loop's first observed config message, which is what actually
    /// applies it. A no-op if `records` is empty.
    pub fn publish_initial_devices(&self, records: &[DeviceRecord]) {
        if records.is_empty() {
            return;
        }
        let value = device_records_to_value(records);
        self.publish_retained(Topic::from_strs(["config", "hal"]), value);
    }

    fn publish_retained(&self, topic: Topic, payload: Value) {
        match self.conn.new_message(topic.clone(), payload, true) {
            Ok(msg) => {
                if let Err(e) = self.conn.publish(msg) {
                    warn!(%topic, error = %e, "failed to publish retained message");
                }
            }
            Err(e) => warn!(%topic, error = %e, "failed to construct retained message"),
        }
    }

    fn publish_event(&self, topic: Topic, payload: Value) {
        match self.conn.new_message(topic.clone(), payload, false) {
            Ok(msg) => {
                if let Err(e) = self.conn.publish(msg) {
                    warn!(%topic, error = %e, "failed to publish event");
                }
            }
            Err(e) => warn!(%topic, error = %e, "failed to construct event"),
        }
    }

    fn publish_hal_state(&self, level: &str) {
        self.publish_retained(
            Topic::from_strs(["hal", "state"]),
            Value::map([("level", Value::Text(level.to_string())), ("ts", Value::U64(now_ms()))]),
        );
    }

    fn reply(&self, original: &Message, payload: Value) {
        if let Err(e) = self.conn.reply(original, payload, false) {
            warn!(error = %e, "failed to post control reply");
        }
    }

    fn reply_error(&self, original: &Message, code: ErrorCode) {
        self.reply(original, Value::map([("ok", Value::Bool(false)), ("error", Value::Error(code))]));
    }

    /// Run the event loop to completion: select over config updates,
    /// control requests, device telemetry, and the shutdown signal, until
    /// the shutdown signal fires, a channel closes, or a fatal
    /// pre-`ready` configuration error occurs.
    pub async fn run(mut self, mut telemetry_rx: mpsc::Receiver<TelemetryEvent>, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut config_sub = self
            .conn
            .subscribe_str(["config", "hal"])
            .expect("config/hal is a valid topic filter");
        let mut control_sub = self
            .conn
            .subscribe_str(["hal", "cap", "+", "+", "+", "control", "+"])
            .expect("the control wildcard is a valid topic filter");

        loop {
            tokio::select! {
                msg = config_sub.recv() => {
                    let Some(msg) = msg else { break };
                    if let Err(e) = self.handle_config(msg).await {
                        error!(error = %e, "fatal error applying configuration before HAL reached ready; shutting down");
                        break;
                    }
                }
                msg = control_sub.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle_control(msg);
                }
                event = telemetry_rx.recv() => {
                    let Some(event) = event else { break };
                    self.handle_telemetry(event);
                }
                _ = &mut shutdown_rx => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_config(&mut self, msg: Message) -> Result<(), HalError> {
        let records = match value_to_device_records(msg.payload()) {
            Ok(r) => r,
            Err(reason) => {
                warn!(reason, "config/hal payload malformed, ignoring");
                return Ok(());
            }
        };

        for record in records {
            let id = DeviceId::from(record.id.clone());
            if self.devices.contains_key(&id) {
                continue;
            }
            if let Err(e) = self.build_and_init_device(id.clone(), record).await {
                if self.ready {
                    warn!(device = %id, error = %e, "skipping device after HAL reached ready");
                    continue;
                }
                return Err(e);
            }
        }

        if !self.ready {
            self.ready = true;
            info!("HAL reached ready");
            self.publish_hal_state("ready");
        }
        Ok(())
    }

    async fn build_and_init_device(&mut self, id: DeviceId, record: DeviceRecord) -> Result<(), HalError> {
        let resources = Resources {
            registry: self.registry.clone(),
            ring_table: self.ring_table.clone(),
        };
        let ctx = BuildContext {
            id: id.clone(),
            device_type: record.device_type.clone(),
            params: record.params,
            resources,
        };
        let mut device = self.builders.build(ctx)?;

        let caps = device.capabilities().to_vec();
        if caps.is_empty() {
            return Err(HalError::BuildFailed {
                id: id.to_string(),
                reason: "device declared no capabilities".into(),
            });
        }
        let emitter = Emitter::new(self.telemetry_tx.clone());

        device.init(emitter).await.map_err(|e| HalError::InitFailed {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        for cap in &caps {
            self.capability_index.insert(cap.address(), id.clone());
            self.publish_retained(cap_topic(&cap.address(), "info"), cap.info.clone());
            self.publish_retained(cap_topic(&cap.address(), "status"), status_value(LinkState::Down, None));
        }

        debug!(device = %id, device_type = %record.device_type, "device built and initialized");
        self.devices.insert(id, device);
        Ok(())
    }

    fn handle_control(&mut self, msg: Message) {
        let (addr, verb) = match msg.topic().parse_control() {
            Ok(v) => v,
            Err(_) => {
                self.reply_error(&msg, ErrorCode::InvalidTopic);
                return;
            }
        };

        if !self.ready {
            self.reply_error(&msg, ErrorCode::HALNotReady);
            return;
        }

        let Some(owner) = self.capability_index.get(&addr).cloned() else {
            self.reply_error(&msg, ErrorCode::UnknownCapability);
            return;
        };
        let Some(device) = self.devices.get_mut(&owner) else {
            self.reply_error(&msg, ErrorCode::UnknownCapability);
            return;
        };

        let (ack, error) = device.control(&addr, &verb, msg.payload().clone());
        if let Some(err) = error {
            self.reply_error(&msg, err);
            return;
        }
        match ack {
            ControlAck::Accepted => {
                self.reply(&msg, Value::map([("ok", Value::Bool(true))]));
            }
            ControlAck::Refused(code) => {
                self.reply_error(&msg, code.unwrap_or(ErrorCode::Busy));
            }
        }
    }

    fn handle_telemetry(&self, event: TelemetryEvent) {
        let addr = &event.address;

        if let Some(err) = event.error {
            self.publish_retained(cap_topic(addr, "status"), status_value(LinkState::Degraded, Some(err)));
            return;
        }

        if event.is_event {
            let topic = match &event.tag {
                Some(tag) => addr.base_topic().join([Token::text("event"), Token::text(tag)]),
                None => addr.base_topic().join([Token::text("event")]),
            };
            self.publish_event(topic, event.payload.unwrap_or(Value::Unit));
        } else {
            self.publish_retained(cap_topic(addr, "value"), event.payload.unwrap_or(Value::Unit));
        }

        self.publish_retained(cap_topic(addr, "status"), status_value(LinkState::Up, None));
    }

    async fn shutdown(mut self) {
        for (id, mut device) in self.devices.drain() {
            if let Err(e) = device.close().await {
                warn!(device = %id, error = %e, "device close failed");
            }
        }
        self.registry.close();
        self.publish_hal_state("stopped");
        info!("HAL shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mchal_bus::Bus;
    use mchal_registry::ResourcePlan;
    use std::time::Duration;

    use crate::device::CapabilitySpec;

    struct EchoSwitch {
        id: DeviceId,
        caps: Vec<CapabilitySpec>,
        on: bool,
        emitter: Option<Emitter>,
    }

    #[async_trait]
    impl Device for EchoSwitch {
        fn id(&self) -> &DeviceId {
            &self.id
        }
        fn capabilities(&self) -> &[CapabilitySpec] {
            &self.caps
        }
        async fn init(&mut self, emitter: Emitter) -> Result<(), HalError> {
            emitter.emit_value(self.caps[0].address(), Value::Bool(self.on));
            self.emitter = Some(emitter);
            Ok(())
        }
        fn control(&mut self, _address: &CapabilityAddress, verb: &str, payload: Value) -> (ControlAck, Option<ErrorCode>) {
            match verb {
                "set" => {
                    let Some(on) = payload.as_bool() else {
                        return (ControlAck::Refused(Some(ErrorCode::InvalidPayload)), None);
                    };
                    self.on = on;
                    if let Some(e) = &self.emitter {
                        e.emit_value(self.caps[0].address(), Value::Bool(self.on));
                    }
                    (ControlAck::Accepted, None)
                }
                _ => (ControlAck::Refused(Some(ErrorCode::Unsupported)), None),
            }
        }
        async fn close(&mut self) -> Result<(), HalError> {
            Ok(())
        }
    }

    fn make_echo_switch(ctx: BuildContext) -> Result<Box<dyn Device>, HalError> {
        Ok(Box::new(EchoSwitch {
            id: ctx.id,
            caps: vec![CapabilitySpec::new("io", "switch", "rail1", Value::map([("kind", Value::Text("switch".into()))]))],
            on: false,
            emitter: None,
        }))
    }

    fn make_service() -> (HalService, mpsc::Receiver<TelemetryEvent>, Bus) {
        let bus = Bus::new(16, "+", "#").unwrap();
        let conn = bus.new_connection("hal");
        let registry = Arc::new(Registry::new(ResourcePlan::simple(4)));
        let ring_table = Arc::new(RingTable::new());
        let mut builders = DeviceBuilderRegistry::new();
        builders.register("echo_switch", make_echo_switch);
        let (service, rx) = HalService::new(conn, registry, ring_table, builders);
        (service, rx, bus)
    }

    struct NoCapsDevice {
        id: DeviceId,
    }

    #[async_trait]
    impl Device for NoCapsDevice {
        fn id(&self) -> &DeviceId {
            &self.id
        }
        fn capabilities(&self) -> &[CapabilitySpec] {
            &[]
        }
        async fn init(&mut self, _emitter: Emitter) -> Result<(), HalError> {
            Ok(())
        }
        fn control(&mut self, _address: &CapabilityAddress, _verb: &str, _payload: Value) -> (ControlAck, Option<ErrorCode>) {
            (ControlAck::Refused(Some(ErrorCode::Unsupported)), None)
        }
        async fn close(&mut self) -> Result<(), HalError> {
            Ok(())
        }
    }

    /// A device that declares zero capabilities fails its build with
    /// `BuildFailed` instead of panicking (the build-time analog of
    /// `crate::builder`'s `NoopDevice` test fixture).
    #[tokio::test]
    async fn device_with_no_capabilities_fails_build_instead_of_panicking() {
        let (mut service, _rx, _bus) = make_service();
        let record = DeviceRecord {
            id: "ghost".to_string(),
            device_type: "no_caps".to_string(),
            params: toml::Table::new(),
        };
        service.builders.register("no_caps", |ctx| Ok(Box::new(NoCapsDevice { id: ctx.id })));

        let err = service.build_and_init_device(DeviceId::from("ghost"), record).await.unwrap_err();
        assert!(matches!(err, HalError::BuildFailed { id, .. } if id == "ghost"));
        assert_eq!(service.device_count(), 0);
    }

    /// Property 7 (HAL not-ready gate): a control message sent before any
    /// config has been applied is refused with `HALNotReady`.
    #[tokio::test]
    async fn control_before_ready_is_refused() {
        let (service, rx, bus) = make_service();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let requester = bus.new_connection("req");

        let run_task = tokio::spawn(service.run(rx, shutdown_rx));

        let msg = requester
            .new_message(
                Topic::from_strs(["hal", "cap", "io", "switch", "rail1", "control", "set"]),
                Value::Bool(true),
                false,
            )
            .unwrap();
        let reply = requester.request_wait(Duration::from_millis(500), msg).await.unwrap();
        assert_eq!(reply.payload().field("ok"), Some(&Value::Bool(false)));
        assert_eq!(reply.payload().field("error"), Some(&Value::Error(ErrorCode::HALNotReady)));

        let _ = shutdown_tx.send(());
        let _ = run_task.await;
    }

    /// Scenario-style end-to-end check: publishing a device list brings
    /// the HAL to ready, indexes the capability, and a subsequent control
    /// message is accepted and produces a retained value/status pair.
    #[tokio::test]
    async fn full_lifecycle_builds_device_and_serves_control() {
        let (service, rx, bus) = make_service();
        let records = vec![DeviceRecord {
            id: "rail1".to_string(),
            device_type: "echo_switch".to_string(),
            params: toml::Table::new(),
        }];
        service.publish_initial_devices(&records);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let run_task = tokio::spawn(service.run(rx, shutdown_rx));

        // Allow the first (self-replayed) config message to be processed.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status_sub_conn = bus.new_connection("watch");
        let mut status_sub = status_sub_conn
            .subscribe_str(["hal", "cap", "io", "switch", "rail1", "status"])
            .unwrap();
        let status = tokio::time::timeout(Duration::from_millis(500), status_sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.payload().field("link"), Some(&Value::Text("down".to_string())));

        let requester = bus.new_connection("req");
        let msg = requester
            .new_message(
                Topic::from_strs(["hal", "cap", "io", "switch", "rail1", "control", "set"]),
                Value::Bool(true),
                false,
            )
            .unwrap();
        let reply = requester.request_wait(Duration::from_millis(500), msg).await.unwrap();
        assert_eq!(reply.payload().field("ok"), Some(&Value::Bool(true)));

        // The telemetry publish triggered by `control` is drained on the
        // event loop's next iteration, asynchronously from the reply.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let value_sub_conn = bus.new_connection("watch2");
        let mut value_sub = value_sub_conn
            .subscribe_str(["hal", "cap", "io", "switch", "rail1", "value"])
            .unwrap();
        let value = tokio::time::timeout(Duration::from_millis(500), value_sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.payload(), &Value::Bool(true));

        let _ = shutdown_tx.send(());
        let _ = run_task.await;
    }

    /// Unknown capability addresses and malformed control topics are
    /// refused with distinct error codes.
    #[tokio::test]
    async fn control_on_unknown_capability_and_malformed_topic_are_refused() {
        let (service, rx, bus) = make_service();
        let records = vec![DeviceRecord {
            id: "rail1".to_string(),
            device_type: "echo_switch".to_string(),
            params: toml::Table::new(),
        }];
        service.publish_initial_devices(&records);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let run_task = tokio::spawn(service.run(rx, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let requester = bus.new_connection("req");

        let unknown = requester
            .new_message(
                Topic::from_strs(["hal", "cap", "io", "switch", "rail2", "control", "set"]),
                Value::Bool(true),
                false,
            )
            .unwrap();
        let reply = requester.request_wait(Duration::from_millis(500), unknown).await.unwrap();
        assert_eq!(reply.payload().field("error"), Some(&Value::Error(ErrorCode::UnknownCapability)));

        // A non-text token in a wildcard-matched position passes the
        // subscription filter (which matches by position, not by token
        // kind) but fails `parse_control`'s all-text requirement.
        let malformed = requester
            .new_message(
                Topic::new(vec![
                    Token::text("hal"),
                    Token::text("cap"),
                    Token::int(1),
                    Token::text("switch"),
                    Token::text("rail1"),
                    Token::text("control"),
                    Token::text("set"),
                ]),
                Value::Unit,
                false,
            )
            .unwrap();
        let reply = requester.request_wait(Duration::from_millis(500), malformed).await.unwrap();
        assert_eq!(reply.payload().field("error"), Some(&Value::Error(ErrorCode::InvalidTopic)));

        let _ = shutdown_tx.send(());
        let _ = run_task.await;
    }
}
