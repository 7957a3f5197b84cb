//! I2C bus claims and the per-bus serialisation worker.
//!
//! Grounded on the `other_examples` DrMem `RequestChan`/`Request` shape
//! (bounded `mpsc` request queue, `oneshot` completion reply) — the
//! teacher accesses I2C registers directly inside its single RT loop, so
//! this pattern is adapted from that corpus file rather than the
//! teacher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::RegistryError;

struct Transaction {
    addr: u8,
    write_buf: Vec<u8>,
    read_len: usize,
    reply: oneshot::Sender<Result<Vec<u8>, RegistryError>>,
}

/// A handle to one I2C bus's serialisation worker. Every
/// [`crate::Registry::claim_i2c`] call for the same bus id returns a
/// transport sharing this worker, so transactions from different devices
/// on the same bus are totally ordered.
#[derive(Clone)]
pub struct I2cTransport {
    sender: mpsc::Sender<Transaction>,
    /// Injects a canned failure for the next transaction; used by tests
    /// to simulate a NACK (scenario S3) without real hardware.
    fault: Arc<std::sync::Mutex<Option<RegistryError>>>,
}

impl I2cTransport {
    /// Perform a combined write-then-read transaction. `timeout` bounds
    /// both the enqueue step (mapping to [`RegistryError::WorkerBusy`])
    /// and the transaction's completion (mapping to
    /// [`RegistryError::Timeout`]).
    pub async fn transaction(
        &self,
        addr: u8,
        write_buf: &[u8],
        read_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let txn = Transaction {
            addr,
            write_buf: write_buf.to_vec(),
            read_len,
            reply: reply_tx,
        };
        self.sender.try_send(txn).map_err(|_| {
            warn!(addr, "i2c worker queue full, rejecting transaction");
            RegistryError::WorkerBusy
        })?;
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RegistryError::Unavailable),
            Err(_) => {
                warn!(addr, "i2c transaction timed out");
                Err(RegistryError::Timeout)
            }
        }
    }

    /// Test-only fault injector: the next transaction on this bus
    /// returns `err` instead of executing.
    pub fn inject_fault(&self, err: RegistryError) {
        *self.fault.lock().unwrap() = Some(err);
    }
}

pub(crate) struct I2cWorker {
    pub(crate) transport: I2cTransport,
    task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl I2cWorker {
    pub(crate) fn spawn(queue_size: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Transaction>(queue_size.max(1));
        let fault = Arc::new(std::sync::Mutex::new(None));
        let fault_for_task = fault.clone();
        let closed = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(async move {
            while let Some(txn) = rx.recv().await {
                let outcome = {
                    let mut f = fault_for_task.lock().unwrap();
                    if let Some(err) = f.take() {
                        Err(err)
                    } else {
                        // No real hardware: a transaction simulator that
                        // echoes zero bytes, matching the "devices are
                        // out of scope" boundary — the registry's job
                        // ends at strict per-bus ordering, not at
                        // register semantics.
                        let _ = txn.addr;
                        let _ = txn.write_buf;
                        Ok(vec![0u8; txn.read_len])
                    }
                };
                let _ = txn.reply.send(outcome);
            }
        });

        I2cWorker {
            transport: I2cTransport { sender: tx, fault },
            task,
            closed,
        }
    }

    pub(crate) fn stop(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            self.task.abort();
        }
    }
}
