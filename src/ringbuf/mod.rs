//! Bounded single-producer single-consumer ring buffers
//!
//! Two layers: [`RingBuffer`] is the lock-free core with atomic index
//! arithmetic and non-blocking whole-item operations, safe to use from
//! interrupt-equivalent contexts. [`BlockingRing`] gates the same core with
//! a pair of counting semaphores for task-context callers that want to wait
//! for space or data with a bounded timeout.

pub mod basic;
pub mod blocking;

#[cfg(test)]
mod tests;

pub use basic::{Consumer, Producer, RingBuffer};
pub use blocking::BlockingRing;
