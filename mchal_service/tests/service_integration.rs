//! Scenario S2 end to end: six GPIO rails sequenced on, then off, through
//! the full bus + registry + service stack, wired the same way `mchald`
//! wires it in `main.rs` (minus config-file loading).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use mchal_bus::Bus;
use mchal_registry::{Registry, ResourcePlan};
use mchal_ring::RingTable;
use mchal_service::config::DeviceRecord;
use mchal_service::{register_builtin_devices, DeviceBuilderRegistry, HalService};
use mchal_types::error::ErrorCode;
use mchal_types::value::Value;
use mchal_types::Topic;

const RAIL_COUNT: u32 = 6;

fn rail_id(i: u32) -> String {
    format!("rail{i}")
}

#[tokio::test]
async fn six_switches_sequence_on_then_off_with_retained_status_and_value_updates() {
    let bus = Bus::new(32, "+", "#").unwrap();
    let conn = bus.new_connection("hal");
    let registry = Arc::new(Registry::new(ResourcePlan::simple(RAIL_COUNT)));
    let ring_table = Arc::new(RingTable::new());
    let mut builders = DeviceBuilderRegistry::new();
    register_builtin_devices(&mut builders);

    let (service, telemetry_rx) = HalService::new(conn, registry, ring_table, builders);

    let records: Vec<DeviceRecord> = (0..RAIL_COUNT)
        .map(|i| {
            let mut params = toml::Table::new();
            params.insert("pin".to_string(), toml::Value::Integer(i as i64));
            DeviceRecord {
                id: rail_id(i),
                device_type: "switch".to_string(),
                params,
            }
        })
        .collect();
    service.publish_initial_devices(&records);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run_task = tokio::spawn(service.run(telemetry_rx, shutdown_rx));

    // let the self-replayed config message build all six devices
    tokio::time::sleep(Duration::from_millis(50)).await;

    let watcher = bus.new_connection("watch");
    let mut value_subs: Vec<_> = (0..RAIL_COUNT)
        .map(|i| {
            watcher
                .subscribe_str(["hal", "cap", "io", "switch", rail_id(i).as_str(), "value"])
                .unwrap()
        })
        .collect();
    let mut status_subs: Vec<_> = (0..RAIL_COUNT)
        .map(|i| {
            watcher
                .subscribe_str(["hal", "cap", "io", "switch", rail_id(i).as_str(), "status"])
                .unwrap()
        })
        .collect();

    // each device's init() emits its own initial retained value/status
    for i in 0..RAIL_COUNT as usize {
        let initial = tokio::time::timeout(Duration::from_millis(200), value_subs[i].recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(initial.payload(), &Value::Bool(false));
        let status = tokio::time::timeout(Duration::from_millis(200), status_subs[i].recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.payload().field("link"), Some(&Value::Text("down".to_string())));
    }

    let requester = bus.new_connection("req");

    // sequence rails on in order
    for i in 0..RAIL_COUNT {
        let msg = requester
            .new_message(
                Topic::from_strs(["hal", "cap", "io", "switch", rail_id(i).as_str(), "control", "set"]),
                Value::Bool(true),
                false,
            )
            .unwrap();
        let reply = requester.request_wait(Duration::from_millis(500), msg).await.unwrap();
        assert_eq!(reply.payload().field("ok"), Some(&Value::Bool(true)));

        let value = tokio::time::timeout(Duration::from_millis(200), value_subs[i as usize].recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.payload(), &Value::Bool(true));
        let status = tokio::time::timeout(Duration::from_millis(200), status_subs[i as usize].recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.payload().field("link"), Some(&Value::Text("up".to_string())));
    }

    // sequence rails off in reverse order
    for i in (0..RAIL_COUNT).rev() {
        let msg = requester
            .new_message(
                Topic::from_strs(["hal", "cap", "io", "switch", rail_id(i).as_str(), "control", "set"]),
                Value::Bool(false),
                false,
            )
            .unwrap();
        let reply = requester.request_wait(Duration::from_millis(500), msg).await.unwrap();
        assert_eq!(reply.payload().field("ok"), Some(&Value::Bool(true)));

        let value = tokio::time::timeout(Duration::from_millis(200), value_subs[i as usize].recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.payload(), &Value::Bool(false));
    }

    let _ = shutdown_tx.send(());
    let _ = run_task.await;
}

/// A control verb the switch doesn't understand is refused with
/// `InvalidPayload` and never reaches the retained value topic.
#[tokio::test]
async fn unsupported_control_verb_is_refused_without_side_effects() {
    let bus = Bus::new(16, "+", "#").unwrap();
    let conn = bus.new_connection("hal");
    let registry = Arc::new(Registry::new(ResourcePlan::simple(1)));
    let ring_table = Arc::new(RingTable::new());
    let mut builders = DeviceBuilderRegistry::new();
    register_builtin_devices(&mut builders);

    let (service, telemetry_rx) = HalService::new(conn, registry, ring_table, builders);
    let mut params = toml::Table::new();
    params.insert("pin".to_string(), toml::Value::Integer(0));
    service.publish_initial_devices(&[DeviceRecord {
        id: "rail0".to_string(),
        device_type: "switch".to_string(),
        params,
    }]);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run_task = tokio::spawn(service.run(telemetry_rx, shutdown_rx));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let requester = bus.new_connection("req");
    let msg = requester
        .new_message(
            Topic::from_strs(["hal", "cap", "io", "switch", "rail0", "control", "blink"]),
            Value::Unit,
            false,
        )
        .unwrap();
    let reply = requester.request_wait(Duration::from_millis(500), msg).await.unwrap();
    assert_eq!(reply.payload().field("error"), Some(&Value::Error(ErrorCode::InvalidPayload)));

    let _ = shutdown_tx.send(());
    let _ = run_task.await;
}
