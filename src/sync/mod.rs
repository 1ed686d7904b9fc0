//! Synchronization primitives for the task-context call paths
//!
//! The fast/ISR paths of the bus touch only atomics; everything that may
//! block goes through the counting semaphore in this module, so every wait
//! is bounded by an explicit caller-supplied timeout.

pub mod semaphore;

pub use semaphore::Semaphore;
