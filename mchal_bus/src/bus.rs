//! The bus core: retained store, subscription list, and publish/subscribe
//! mechanics.
//!
//! Per the Open Question resolution recorded in `DESIGN.md`, the retained
//! store and the subscription list share a single `parking_lot::RwLock`-
//! guarded inner struct. `subscribe` takes the write lock once to both
//! insert into the subscription list and scan the retained store, so a
//! concurrent publish is either fully observed (if it commits first) or
//! not observed at all (if it commits after) — never half-observed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

use mchal_types::token::Token;
use mchal_types::topic::{Topic, TopicFilter};
use mchal_types::value::Value;

use crate::connection::Connection;
use crate::error::BusError;
use crate::message::Message;
use crate::subscription::Subscription;

struct SubEntry {
    filter: TopicFilter,
    sender: mpsc::Sender<Message>,
    dropped: Arc<AtomicU64>,
}

struct BusState {
    retained: HashMap<Topic, Message>,
    subs: HashMap<u64, SubEntry>,
}

struct BusInner {
    single: Token,
    multi: Token,
    default_queue_size: usize,
    next_sub_id: AtomicU64,
    next_conn_id: AtomicU64,
    next_corr_id: AtomicU64,
    state: RwLock<BusState>,
}

/// The in-process topic bus. Cheap to clone (an `Arc` handle); every
/// clone shares the same retained store and subscription list.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Construct a new bus. `default_queue_size` bounds new subscriptions'
    /// delivery queues absent a per-subscription override (none is
    /// currently exposed; the spec's default-queue-size parameter is the
    /// only tunable). `single`/`multi` are the wildcard token texts and
    /// must be non-empty and distinct.
    pub fn new(
        default_queue_size: usize,
        single_wildcard: impl Into<String>,
        multi_wildcard: impl Into<String>,
    ) -> Result<Self, BusError> {
        let single = single_wildcard.into();
        let multi = multi_wildcard.into();
        if single.is_empty() || multi.is_empty() || single == multi {
            return Err(BusError::InvalidParams);
        }
        Ok(Bus {
            inner: Arc::new(BusInner {
                single: Token::text(single),
                multi: Token::text(multi),
                default_queue_size,
                next_sub_id: AtomicU64::new(1),
                next_conn_id: AtomicU64::new(1),
                next_corr_id: AtomicU64::new(1),
                state: RwLock::new(BusState {
                    retained: HashMap::new(),
                    subs: HashMap::new(),
                }),
            }),
        })
    }

    /// The configured single-level wildcard token.
    pub fn single_wildcard(&self) -> &Token {
        &self.inner.single
    }

    /// The configured multi-level wildcard token.
    pub fn multi_wildcard(&self) -> &Token {
        &self.inner.multi
    }

    /// Create a new named connection on this bus.
    pub fn new_connection(&self, name: impl Into<String>) -> Connection {
        let id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        Connection::new(id, name.into(), self.clone())
    }

    /// Build a topic filter, validating wildcard placement against this
    /// bus's configured wildcard tokens.
    pub fn filter_from_strs<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<TopicFilter, BusError> {
        Ok(TopicFilter::from_strs(segments, &self.inner.single, &self.inner.multi)?)
    }

    /// Build a message. Constructing with a wildcard-bearing topic and
    /// `retained = true` fails with [`BusError::InvalidTopic`].
    pub fn new_message(&self, topic: Topic, payload: Value, retained: bool) -> Result<Message, BusError> {
        if retained {
            topic.validate_publishable(&self.inner.single, &self.inner.multi)?;
        }
        Ok(Message::new(topic, payload, retained))
    }

    pub(crate) fn default_queue_size(&self) -> usize {
        self.inner.default_queue_size
    }

    pub(crate) fn alloc_corr_id(&self) -> u64 {
        self.inner.next_corr_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Deliver `message` to every matching subscription; update the
    /// retained store if the message is retained.
    pub(crate) fn publish(&self, message: Message) -> Result<(), BusError> {
        if message.is_retained() {
            message
                .topic()
                .validate_publishable(&self.inner.single, &self.inner.multi)?;
        }

        let mut state = self.inner.state.write();

        if message.is_retained() {
            if message.payload().is_clear() {
                state.retained.remove(message.topic());
            } else {
                state.retained.insert(message.topic().clone(), message.clone());
            }
        }

        for (id, entry) in state.subs.iter() {
            if entry.filter.matches(message.topic(), &self.inner.single, &self.inner.multi) {
                if entry.sender.try_send(message.clone()).is_err() {
                    let total = entry.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(subscription = id, topic = %message.topic(), total_dropped = total, "subscription queue full, dropping message");
                }
            }
        }
        Ok(())
    }

    /// Register a subscription, then atomically replay all currently
    /// retained messages matching `filter`, before any live message can
    /// be observed by the new subscription.
    pub(crate) fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.default_queue_size.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let mut state = self.inner.state.write();
        for (topic, msg) in state.retained.iter() {
            if filter.matches(topic, &self.inner.single, &self.inner.multi) {
                // Replay best-effort: if the fresh queue is already full
                // (only possible with a queue size of 0), count it the
                // same as a live overflow.
                if tx.try_send(msg.clone()).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(subscription = id, topic = %topic, "retained replay dropped: queue full at subscribe time");
                }
            }
        }
        state.subs.insert(
            id,
            SubEntry {
                filter: filter.clone(),
                sender: tx,
                dropped: dropped.clone(),
            },
        );
        drop(state);

        Subscription::new(id, filter, rx, dropped, self.clone())
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        self.inner.state.write().subs.remove(&id);
    }

    /// Number of currently-registered subscriptions, across all
    /// connections. Used by tests to verify that closing a connection
    /// cleans up its subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.read().subs.len()
    }

    /// Wait for a reply on `subscription` until `deadline` elapses.
    pub(crate) async fn wait_reply(
        &self,
        subscription: &mut Subscription,
        deadline: Duration,
    ) -> Result<Message, BusError> {
        match timeout(deadline, subscription.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(BusError::Cancelled),
            Err(_) => Err(BusError::Timeout),
        }
    }
}
