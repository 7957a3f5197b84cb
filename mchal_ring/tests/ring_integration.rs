//! Cross-task SPSC ring integration tests.
//!
//! The unit tests in `src/ring.rs` drive both halves from one thread to
//! pin down the index arithmetic; these exercise the ring the way it is
//! actually used — producer and consumer on separate tokio tasks,
//! coordinating purely through the readiness edges.

use mchal_ring::Ring;

#[tokio::test]
async fn producer_and_consumer_tasks_preserve_byte_order_across_wraps() {
    let (mut tx, mut rx) = Ring::new(64).unwrap();
    let produced: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();

    let producer_data = produced.clone();
    let producer = tokio::spawn(async move {
        let mut sent = 0usize;
        while sent < producer_data.len() {
            if tx.space() == 0 {
                tx.writable().await;
                continue;
            }
            let chunk = &producer_data[sent..(sent + 7).min(producer_data.len())];
            let n = tx.try_write_from(chunk);
            sent += n;
        }
    });

    let consumer = tokio::spawn(async move {
        let mut received = Vec::with_capacity(produced.len());
        while received.len() < produced.len() {
            if rx.available() == 0 {
                rx.readable().await;
                continue;
            }
            let mut buf = [0u8; 5];
            let n = rx.try_read_into(&mut buf);
            received.extend_from_slice(&buf[..n]);
        }
        received
    });

    producer.await.unwrap();
    let received = consumer.await.unwrap();
    assert_eq!(received, produced);
}

#[tokio::test]
async fn consumer_observes_readable_edge_after_producer_task_writes() {
    let (mut tx, mut rx) = Ring::new(16).unwrap();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.try_write_from(b"woken");
    });

    rx.readable().await;
    assert!(rx.available() >= 5);
    writer.await.unwrap();
}

#[tokio::test]
async fn producer_task_blocks_on_writable_until_consumer_drains() {
    let (mut tx, mut rx) = Ring::new(4).unwrap();
    assert_eq!(tx.try_write_from(&[1, 2, 3, 4]), 4);
    assert_eq!(tx.space(), 0);

    let producer = tokio::spawn(async move {
        tx.writable().await;
        tx.try_write_from(&[9])
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let mut sink = [0u8; 1];
    rx.try_read_into(&mut sink);

    let written = producer.await.unwrap();
    assert_eq!(written, 1);
}
