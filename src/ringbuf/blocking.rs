//! Semaphore-gated blocking variant of the SPSC ring buffer

use std::time::Duration;

use crate::{
    error::{EvbusError, Result},
    ringbuf::basic::RingBuffer,
    sync::Semaphore,
};

/// SPSC ring buffer with blocking push/pop bounded by explicit timeouts
///
/// Two counting semaphores gate the lock-free core: `spaces` starts at the
/// capacity and bounds occupancy before the buffer is touched, `items`
/// starts at zero and bounds reads. A permit on the relevant semaphore
/// guarantees the subsequent non-blocking ring operation succeeds, so the
/// core never spins.
///
/// Like the core ring, one producer and one consumer at a time.
#[derive(Debug)]
pub struct BlockingRing<T> {
    ring: RingBuffer<T>,
    items: Semaphore,
    spaces: Semaphore,
}

impl<T> BlockingRing<T> {
    /// Create a blocking ring; the capacity must be a power of two
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: RingBuffer::new(capacity)?,
            items: Semaphore::new(0),
            spaces: Semaphore::new(capacity),
        })
    }

    /// Create a blocking ring with an arbitrary non-zero capacity
    pub fn with_any_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: RingBuffer::with_any_capacity(capacity)?,
            items: Semaphore::new(0),
            spaces: Semaphore::new(capacity),
        })
    }

    /// Push without blocking; fails with `BufferFull` when no space is left
    pub fn try_push(&self, item: T) -> Result<()> {
        if !self.spaces.try_acquire() {
            return Err(EvbusError::buffer_full("BlockingRing"));
        }
        self.ring.producer().try_push(item)?;
        self.items.release();
        Ok(())
    }

    /// Push, waiting up to `timeout` for space.
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` behaves exactly
    /// like [`try_push`](Self::try_push). A timeout that elapses is reported
    /// as `BufferFull` and leaves the buffer unchanged.
    pub fn push_timeout(&self, item: T, timeout: Option<Duration>) -> Result<()> {
        if !self.spaces.acquire(timeout) {
            return Err(EvbusError::buffer_full("BlockingRing"));
        }
        // Holding a space permit guarantees the ring has room.
        self.ring.producer().try_push(item)?;
        self.items.release();
        Ok(())
    }

    /// Pop without blocking; fails with `BufferEmpty` when nothing is queued
    pub fn try_pop(&self) -> Result<T> {
        if !self.items.try_acquire() {
            return Err(EvbusError::buffer_empty("BlockingRing"));
        }
        let item = self.ring.consumer().try_pop()?;
        self.spaces.release();
        Ok(item)
    }

    /// Pop, waiting up to `timeout` for an item.
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` behaves exactly
    /// like [`try_pop`](Self::try_pop). A timeout that elapses is reported
    /// as `BufferEmpty`.
    pub fn pop_timeout(&self, timeout: Option<Duration>) -> Result<T> {
        if !self.items.acquire(timeout) {
            return Err(EvbusError::buffer_empty("BlockingRing"));
        }
        let item = self.ring.consumer().try_pop()?;
        self.spaces.release();
        Ok(item)
    }

    /// Get the current number of buffered items
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Get available space for writing
    pub fn available_space(&self) -> usize {
        self.ring.available_space()
    }

    /// Get the capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Drop buffered items, reinitialize indices and recreate the gates.
    ///
    /// Requires exclusive access; not safe while pushes or pops are in
    /// flight on other threads.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.items = Semaphore::new(0);
        self.spaces = Semaphore::new(self.ring.capacity());
    }
}
