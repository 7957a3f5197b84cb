//! # mchal_ring
//!
//! Component A: a fixed power-of-two-capacity single-producer
//! single-consumer byte ring with a zero-copy wrap-around span API and
//! coalesced edge-triggered readiness signalling, plus the process-wide
//! ring handle table used to hand rings to clients through the bus's
//! payload system.

#![warn(missing_docs)]

mod error;
mod handle;
mod ring;

pub use error::RingError;
pub use handle::{RingHandle, RingTable};
pub use ring::{Ring, RingConsumer, RingProducer};
