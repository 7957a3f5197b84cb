//! The SPSC ring core.
//!
//! Indices are monotonically increasing `u32` counters compared with
//! wrapping (modular) arithmetic, per the data model: `0 <= writer -
//! reader <= capacity`, empty iff equal, full iff the distance equals
//! capacity. The backing buffer is shared between the producer and
//! consumer halves through an `UnsafeCell`; exclusivity is enforced by
//! Rust ownership, not by the cell — [`RingProducer`] and [`RingConsumer`]
//! are the only ways to reach the buffer, neither is `Clone`, and each is
//! created exactly once by [`Ring::new`]. This mirrors the cache-line-
//! discipline, explicit-`Ordering` style of `evo_shared_memory::segment`,
//! adapted from cross-process shared memory to an in-process `Arc`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::RingError;

struct RingInner {
    buf: UnsafeCell<Box<[u8]>>,
    mask: u32,
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    /// Coalesced edge signal: fires when the ring moves from empty to
    /// non-empty (consumer side wakes).
    readable: Notify,
    /// Coalesced edge signal: fires when the ring moves from full to
    /// non-full (producer side wakes).
    writable: Notify,
}

// SAFETY: the buffer is only ever accessed via `RingProducer` (write side)
// and `RingConsumer` (read side), which never overlap the regions they
// touch (producer writes ahead of `read_idx`, consumer reads behind
// `write_idx`), and each half exists exactly once for the inner's
// lifetime.
unsafe impl Sync for RingInner {}

impl RingInner {
    fn capacity(&self) -> u32 {
        self.mask + 1
    }

    fn buf_ptr(&self) -> *mut u8 {
        // SAFETY: caller (RingProducer/RingConsumer) holds the sole
        // writing/reading half respectively; see the `unsafe impl Sync`
        // note above.
        unsafe { (*self.buf.get()).as_mut_ptr() }
    }
}

/// Not constructed directly; obtained from [`Ring::new`].
pub struct Ring;

impl Ring {
    /// Construct a new ring of the given capacity, which must be a power
    /// of two and at least two, returning its producer and consumer
    /// halves.
    pub fn new(capacity: usize) -> Result<(RingProducer, RingConsumer), RingError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(RingError::InvalidParams(capacity));
        }
        let inner = Arc::new(RingInner {
            buf: UnsafeCell::new(vec![0u8; capacity].into_boxed_slice()),
            mask: (capacity - 1) as u32,
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            readable: Notify::new(),
            writable: Notify::new(),
        });
        Ok((
            RingProducer { inner: inner.clone() },
            RingConsumer { inner },
        ))
    }
}

/// A writable span pair returned by [`RingProducer::write_acquire`].
///
/// `p1` must be filled completely before `p2` is touched, preserving FIFO
/// order across a wrap point.
pub struct WriteSpan<'a> {
    /// First contiguous writable slice.
    pub p1: &'a mut [u8],
    /// Second contiguous writable slice (non-empty only if `p1` reaches
    /// the end of the backing buffer before exhausting free space).
    pub p2: &'a mut [u8],
}

/// A readable span pair returned by [`RingConsumer::read_acquire`].
///
/// `p1` must be drained completely before `p2` is touched.
pub struct ReadSpan<'a> {
    /// First contiguous readable slice.
    pub p1: &'a [u8],
    /// Second contiguous readable slice.
    pub p2: &'a [u8],
}

/// The producer half of a ring: the sole task permitted to write.
pub struct RingProducer {
    inner: Arc<RingInner>,
}

impl RingProducer {
    /// Total ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity() as usize
    }

    /// Bytes currently free for writing.
    pub fn space(&self) -> usize {
        let w = self.inner.write_idx.load(Ordering::Relaxed);
        let r = self.inner.read_idx.load(Ordering::Acquire);
        let used = w.wrapping_sub(r);
        (self.inner.capacity() - used) as usize
    }

    /// Acquire up to `space()` bytes of writable span, split across the
    /// wrap point if necessary. Call [`Self::write_commit`] with the
    /// number of bytes actually written.
    pub fn write_acquire(&mut self) -> WriteSpan<'_> {
        let cap = self.inner.capacity();
        let w = self.inner.write_idx.load(Ordering::Relaxed);
        let r = self.inner.read_idx.load(Ordering::Acquire);
        let used = w.wrapping_sub(r);
        let free = (cap - used) as usize;
        let start = (w & self.inner.mask) as usize;
        let contiguous = cap as usize - start;
        let first_len = free.min(contiguous);
        let second_len = free - first_len;

        let base = self.inner.buf_ptr();
        // SAFETY: [start, start+first_len) and [0, second_len) are
        // disjoint regions within the buffer's bounds (first_len <=
        // contiguous, second_len <= start), and no consumer access can
        // overlap bytes ahead of `r` (the free region).
        unsafe {
            let p1 = std::slice::from_raw_parts_mut(base.add(start), first_len);
            let p2 = std::slice::from_raw_parts_mut(base, second_len);
            WriteSpan { p1, p2 }
        }
    }

    /// Publish `n` bytes previously written via the span(s) from
    /// [`Self::write_acquire`], where `0 <= n <= len(p1)+len(p2)`.
    pub fn write_commit(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let w = self.inner.write_idx.load(Ordering::Relaxed);
        let r = self.inner.read_idx.load(Ordering::Acquire);
        let was_empty = w == r;
        self.inner
            .write_idx
            .store(w.wrapping_add(n as u32), Ordering::Release);
        if was_empty {
            self.inner.readable.notify_one();
        }
    }

    /// Copy up to `min(src.len(), space())` bytes into the ring in one
    /// acquire/commit, returning the number of bytes copied.
    pub fn try_write_from(&mut self, src: &[u8]) -> usize {
        let span = self.write_acquire();
        let first = src.len().min(span.p1.len());
        span.p1[..first].copy_from_slice(&src[..first]);
        let remaining = src.len() - first;
        let second = remaining.min(span.p2.len());
        span.p2[..second].copy_from_slice(&src[first..first + second]);
        let n = first + second;
        self.write_commit(n);
        n
    }

    /// Wait for the coalesced producer readiness edge (full to non-full).
    /// Callers must re-check [`Self::space`] after waking: the token
    /// represents "at least one transition occurred", not a current
    /// guarantee.
    pub async fn writable(&self) {
        self.inner.writable.notified().await;
    }
}

/// The consumer half of a ring: the sole task permitted to read.
pub struct RingConsumer {
    inner: Arc<RingInner>,
}

impl RingConsumer {
    /// Total ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity() as usize
    }

    /// Bytes currently available for reading.
    pub fn available(&self) -> usize {
        let w = self.inner.write_idx.load(Ordering::Acquire);
        let r = self.inner.read_idx.load(Ordering::Relaxed);
        w.wrapping_sub(r) as usize
    }

    /// Acquire up to `available()` bytes of readable span, split across
    /// the wrap point if necessary. Call [`Self::read_release`] with the
    /// number of bytes actually consumed.
    pub fn read_acquire(&mut self) -> ReadSpan<'_> {
        let cap = self.inner.capacity();
        let w = self.inner.write_idx.load(Ordering::Acquire);
        let r = self.inner.read_idx.load(Ordering::Relaxed);
        let used = (w.wrapping_sub(r)) as usize;
        let start = (r & self.inner.mask) as usize;
        let contiguous = cap as usize - start;
        let first_len = used.min(contiguous);
        let second_len = used - first_len;

        let base = self.inner.buf_ptr();
        // SAFETY: see RingProducer::write_acquire; the reader never
        // touches bytes at or beyond `w`.
        unsafe {
            let p1 = std::slice::from_raw_parts(base.add(start), first_len);
            let p2 = std::slice::from_raw_parts(base, second_len);
            ReadSpan { p1, p2 }
        }
    }

    /// Release `n` bytes previously read via the span(s) from
    /// [`Self::read_acquire`], where `0 <= n <= len(p1)+len(p2)`.
    pub fn read_release(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let w = self.inner.write_idx.load(Ordering::Acquire);
        let r = self.inner.read_idx.load(Ordering::Relaxed);
        let was_full = w.wrapping_sub(r) == self.inner.capacity();
        self.inner
            .read_idx
            .store(r.wrapping_add(n as u32), Ordering::Release);
        if was_full {
            self.inner.writable.notify_one();
        }
    }

    /// Copy up to `min(dst.len(), available())` bytes out of the ring in
    /// one acquire/release, returning the number of bytes copied.
    pub fn try_read_into(&mut self, dst: &mut [u8]) -> usize {
        let span = self.read_acquire();
        let first = dst.len().min(span.p1.len());
        dst[..first].copy_from_slice(&span.p1[..first]);
        let remaining = dst.len() - first;
        let second = remaining.min(span.p2.len());
        dst[first..first + second].copy_from_slice(&span.p2[..second]);
        let n = first + second;
        self.read_release(n);
        n
    }

    /// Wait for the coalesced consumer readiness edge (empty to
    /// non-empty). Callers must re-check [`Self::available`] after
    /// waking.
    pub async fn readable(&self) {
        self.inner.readable.notified().await;
    }
}
