//! Process-wide ring handle table.
//!
//! Maps small integer handles to ring halves so that a ring can be
//! referenced from a bus payload (an opaque `u32`) without leaking the
//! owning task's pointer across task boundaries, per §9 "Ring
//! cross-task sharing". Grounded on `evo_hal::driver_registry`'s
//! constructor-injected-registry shape: a plain struct owning a
//! `HashMap`, guarded here by `parking_lot::Mutex` since entries are
//! inserted/removed from arbitrary tasks (registry construction is not a
//! single-threaded startup phase the way driver registration is).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::RingError;
use crate::ring::{RingConsumer, RingProducer};

/// An opaque small-integer handle resolving to one ring half through a
/// [`RingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RingHandle(pub u32);

enum Entry {
    Producer(RingProducer),
    Consumer(RingConsumer),
}

/// A process-wide table of ring halves addressed by [`RingHandle`].
///
/// Each handle is taken exactly once: resolving it removes the entry and
/// hands the caller ownership, matching the single-producer/single-
/// consumer discipline of the ring itself — a handle represents "the one
/// remaining party entitled to this end", not a shareable reference.
pub struct RingTable {
    next: AtomicU32,
    entries: Mutex<HashMap<u32, Entry>>,
}

impl RingTable {
    /// Build an empty table.
    pub fn new() -> Self {
        RingTable {
            next: AtomicU32::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn alloc(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a producer half, returning its handle.
    pub fn register_producer(&self, producer: RingProducer) -> RingHandle {
        let id = self.alloc();
        self.entries.lock().insert(id, Entry::Producer(producer));
        RingHandle(id)
    }

    /// Register a consumer half, returning its handle.
    pub fn register_consumer(&self, consumer: RingConsumer) -> RingHandle {
        let id = self.alloc();
        self.entries.lock().insert(id, Entry::Consumer(consumer));
        RingHandle(id)
    }

    /// Take ownership of the producer half behind `handle`. Fails if the
    /// handle is unknown, already taken, or resolves to a consumer half.
    pub fn take_producer(&self, handle: RingHandle) -> Result<RingProducer, RingError> {
        let mut entries = self.entries.lock();
        match entries.remove(&handle.0) {
            Some(Entry::Producer(p)) => Ok(p),
            Some(other) => {
                entries.insert(handle.0, other);
                Err(RingError::UnknownHandle(handle.0))
            }
            None => Err(RingError::UnknownHandle(handle.0)),
        }
    }

    /// Take ownership of the consumer half behind `handle`. Fails if the
    /// handle is unknown, already taken, or resolves to a producer half.
    pub fn take_consumer(&self, handle: RingHandle) -> Result<RingConsumer, RingError> {
        let mut entries = self.entries.lock();
        match entries.remove(&handle.0) {
            Some(Entry::Consumer(c)) => Ok(c),
            Some(other) => {
                entries.insert(handle.0, other);
                Err(RingError::UnknownHandle(handle.0))
            }
            None => Err(RingError::UnknownHandle(handle.0)),
        }
    }

    /// Drop the entry behind `handle`, if any, without returning it —
    /// used to unregister a ring whose other half was never claimed by a
    /// client (e.g. session closed before the client resolved its
    /// handle).
    pub fn close(&self, handle: RingHandle) {
        self.entries.lock().remove(&handle.0);
    }

    /// Number of entries currently registered.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// `true` if no entries are currently registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RingTable {
    fn default() -> Self {
        Self::new()
    }
}
