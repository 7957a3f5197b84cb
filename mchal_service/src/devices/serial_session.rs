//! A UART port exposed as an on-demand byte-stream session (scenario S1:
//! a loopbacked serial port echoes whatever the client writes).
//!
//! Grounded on `mchal_registry::serial::SerialPort`'s readiness-edge
//! reactor pattern for the forwarding tasks, and on
//! `mchal_ring::handle::RingTable` for handing the two ring halves to a
//! remote client through an opaque `u32` (§9 "Ring cross-task sharing").
//! `control` stays synchronous: opening or closing a session only spawns
//! tasks and registers handles, none of which can block.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use mchal_types::error::ErrorCode;
use mchal_types::value::Value;
use mchal_types::{CapabilityAddress, DeviceId};

use crate::device::{BuildContext, CapabilitySpec, ControlAck, Device, Emitter};
use crate::error::HalError;
use mchal_ring::{Ring, RingHandle, RingTable};
use mchal_registry::{Parity, SerialFormat, SerialPort};

const DEFAULT_RING_CAPACITY: usize = 64;
const FORWARD_CHUNK: usize = 64;

struct OpenSession {
    rx_handle: RingHandle,
    tx_handle: RingHandle,
    rx_to_client: JoinHandle<()>,
    client_to_tx: JoinHandle<()>,
    quit: Arc<Notify>,
}

/// A byte-stream session over a loopbacked UART port. `params`: `port`
/// (required), `ring_capacity` (default 64).
pub struct SerialSession {
    id: DeviceId,
    caps: Vec<CapabilitySpec>,
    port_id: u32,
    ring_capacity: usize,
    port: Option<Arc<SerialPort>>,
    session: Option<OpenSession>,
    emitter: Option<Emitter>,
    resources: crate::device::Resources,
}

impl SerialSession {
    fn close_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.quit.notify_waiters();
        session.rx_to_client.abort();
        session.client_to_tx.abort();
        self.resources.ring_table.close(session.rx_handle);
        self.resources.ring_table.close(session.tx_handle);
        if let Some(emitter) = &self.emitter {
            let cap = self.caps[0].address();
            emitter.emit_event(cap.clone(), None, Some("session_closed".to_string()));
            emitter.emit_error(cap, ErrorCode::Unavailable);
        }
    }
}

#[async_trait]
impl Device for SerialSession {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn capabilities(&self) -> &[CapabilitySpec] {
        &self.caps
    }

    async fn init(&mut self, emitter: Emitter) -> Result<(), HalError> {
        let port = self.resources.registry.claim_serial(self.id.clone(), self.port_id)?;
        self.port = Some(port);
        self.emitter = Some(emitter);
        Ok(())
    }

    fn control(&mut self, _address: &CapabilityAddress, verb: &str, payload: Value) -> (ControlAck, Option<ErrorCode>) {
        let Some(port) = self.port.clone() else {
            return (ControlAck::Refused(Some(ErrorCode::Unavailable)), None);
        };
        match verb {
            "session_open" => {
                if self.session.is_some() {
                    return (ControlAck::Refused(Some(ErrorCode::Conflict)), None);
                }
                let (rx_prod, rx_cons) = match Ring::new(self.ring_capacity) {
                    Ok(halves) => halves,
                    Err(_) => return (ControlAck::Refused(None), Some(ErrorCode::InvalidParams)),
                };
                let (tx_prod, tx_cons) = match Ring::new(self.ring_capacity) {
                    Ok(halves) => halves,
                    Err(_) => return (ControlAck::Refused(None), Some(ErrorCode::InvalidParams)),
                };
                let rx_handle = self.resources.ring_table.register_consumer(rx_cons);
                let tx_handle = self.resources.ring_table.register_producer(tx_prod);
                let quit = Arc::new(Notify::new());

                let rx_to_client = tokio::spawn(forward_serial_to_ring(port.clone(), rx_prod, quit.clone()));
                let client_to_tx = tokio::spawn(forward_ring_to_serial(port.clone(), tx_cons, quit.clone()));

                self.session = Some(OpenSession {
                    rx_handle,
                    tx_handle,
                    rx_to_client,
                    client_to_tx,
                    quit,
                });

                if let Some(emitter) = &self.emitter {
                    emitter.emit_event(
                        self.caps[0].address(),
                        Some(Value::map([
                            ("session_id", Value::Text(self.id.as_str().to_string())),
                            ("rx_handle", Value::Handle(rx_handle.0)),
                            ("tx_handle", Value::Handle(tx_handle.0)),
                        ])),
                        Some("session_opened".to_string()),
                    );
                }
                (ControlAck::Accepted, None)
            }
            "session_close" => {
                if self.session.is_none() {
                    return (ControlAck::Refused(Some(ErrorCode::Unavailable)), None);
                }
                self.close_session();
                (ControlAck::Accepted, None)
            }
            "set_baud" => {
                let Some(baud) = payload.as_u64().map(|v| v as u32) else {
                    return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload));
                };
                port.set_baud(baud);
                (ControlAck::Accepted, None)
            }
            "set_format" => {
                let (Some(data_bits), Some(stop_bits)) = (
                    payload.field("data_bits").and_then(Value::as_u64).map(|v| v as u8),
                    payload.field("stop_bits").and_then(Value::as_u64).map(|v| v as u8),
                ) else {
                    return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload));
                };
                let parity = match payload.field("parity") {
                    Some(Value::Text(s)) if s == "none" => Parity::None,
                    Some(Value::Text(s)) if s == "even" => Parity::Even,
                    Some(Value::Text(s)) if s == "odd" => Parity::Odd,
                    None => Parity::None,
                    _ => return (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload)),
                };
                port.set_format(SerialFormat { data_bits, stop_bits, parity });
                (ControlAck::Accepted, None)
            }
            _ => (ControlAck::Refused(None), Some(ErrorCode::InvalidPayload)),
        }
    }

    async fn close(&mut self) -> Result<(), HalError> {
        self.close_session();
        if self.port.take().is_some() {
            self.resources.registry.release_serial(&self.id, self.port_id);
        }
        Ok(())
    }
}

async fn forward_serial_to_ring(port: Arc<SerialPort>, mut rx_prod: mchal_ring::RingProducer, quit: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = port.readable() => {}
            _ = quit.notified() => return,
        }
        while let Some(byte) = port.read_byte() {
            if rx_prod.try_write_from(&[byte]) == 0 {
                break;
            }
        }
    }
}

async fn forward_ring_to_serial(port: Arc<SerialPort>, mut tx_cons: mchal_ring::RingConsumer, quit: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = tx_cons.readable() => {}
            _ = quit.notified() => return,
        }
        let mut buf = [0u8; FORWARD_CHUNK];
        let n = tx_cons.try_read_into(&mut buf);
        for &byte in &buf[..n] {
            port.write_byte(byte);
        }
    }
}

pub(crate) fn build(ctx: BuildContext) -> Result<Box<dyn Device>, HalError> {
    let port_id = super::param_u32(&ctx.params, "port").ok_or_else(|| super::missing_param(ctx.id.as_str(), "port"))?;
    let ring_capacity = super::param_u32(&ctx.params, "ring_capacity")
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_RING_CAPACITY);
    let name = super::param_str(&ctx.params, "name").unwrap_or_else(|| ctx.id.as_str().to_string());
    let caps = vec![CapabilitySpec::new("io", "stream", name, Value::map([("port", Value::U64(port_id as u64))]))];
    Ok(Box::new(SerialSession {
        id: ctx.id,
        caps,
        port_id,
        ring_capacity,
        port: None,
        session: None,
        emitter: None,
        resources: ctx.resources,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Resources;
    use mchal_registry::{Registry, ResourcePlan};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn ctx(id: &str) -> BuildContext {
        let mut params = toml::Table::new();
        params.insert("port".to_string(), toml::Value::Integer(0));
        BuildContext {
            id: DeviceId::from(id),
            device_type: "serial_session".to_string(),
            params,
            resources: Resources {
                registry: Arc::new(Registry::new(ResourcePlan::simple(1))),
                ring_table: Arc::new(RingTable::new()),
            },
        }
    }

    #[tokio::test]
    async fn session_open_echoes_bytes_through_the_loopbacked_port() {
        let (tx, mut rx) = mpsc::channel(8);
        let build_ctx = ctx("stream1");
        let resources = build_ctx.resources.clone();
        let mut device = build(build_ctx).unwrap();
        device.init(Emitter::new(tx)).await.unwrap();

        let addr = CapabilityAddress::new("io", "stream", "stream1");
        let (ack, _) = device.control(&addr, "session_open", Value::Unit);
        assert_eq!(ack, ControlAck::Accepted);

        let opened = rx.try_recv().unwrap();
        assert_eq!(opened.tag.as_deref(), Some("session_opened"));
        let rx_handle = match opened.payload.as_ref().unwrap().field("rx_handle") {
            Some(Value::Handle(h)) => RingHandle(*h),
            _ => panic!("missing rx_handle"),
        };
        let tx_handle = match opened.payload.as_ref().unwrap().field("tx_handle") {
            Some(Value::Handle(h)) => RingHandle(*h),
            _ => panic!("missing tx_handle"),
        };

        let mut client_tx = resources.ring_table.take_producer(tx_handle).unwrap();
        let mut client_rx = resources.ring_table.take_consumer(rx_handle).unwrap();

        client_tx.try_write_from(b"ping");
        client_rx.readable().await;
        let mut buf = [0u8; 4];
        let n = client_rx.try_read_into(&mut buf);
        assert_eq!(&buf[..n], b"ping");

        let (ack, _) = device.control(&addr, "session_close", Value::Unit);
        assert_eq!(ack, ControlAck::Accepted);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let closed = rx.try_recv().unwrap();
        assert_eq!(closed.tag.as_deref(), Some("session_closed"));
        let degraded = rx.try_recv().unwrap();
        assert_eq!(degraded.error, Some(ErrorCode::Unavailable));
    }
}
