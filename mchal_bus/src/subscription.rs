//! Subscription handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use mchal_types::topic::TopicFilter;

use crate::bus::Bus;
use crate::message::Message;

/// A live subscription: a topic pattern plus a bounded delivery queue
/// owned by one consumer. Identified internally by an opaque id; dropped
/// from the bus's index by [`crate::Connection::unsubscribe`].
pub struct Subscription {
    id: u64,
    filter: TopicFilter,
    receiver: mpsc::Receiver<Message>,
    dropped: Arc<AtomicU64>,
    bus: Bus,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        filter: TopicFilter,
        receiver: mpsc::Receiver<Message>,
        dropped: Arc<AtomicU64>,
        bus: Bus,
    ) -> Self {
        Subscription {
            id,
            filter,
            receiver,
            dropped,
            bus,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The subscription's topic pattern.
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Await the next delivered message. Resolves to `None` only if the
    /// bus itself is gone (all senders dropped) — in normal operation
    /// this only happens if the owning [`crate::Connection`] is dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Total number of messages dropped for this subscription because
    /// its delivery queue was full at delivery time. Counted, not
    /// surfaced as an error, per the bus's failure taxonomy.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }
}
