//! Multi-producer event-key queue for the interrupt-context publish path
//!
//! `publish_isr` may be reached from several independent interrupt sources,
//! so a plain SPSC ring is not enough: each cell carries a sequence number
//! and producers reserve a cell with a CAS on the write index before
//! touching it. Consumption stays single-consumer (the topic server drains
//! in task context). Push and pop never block and never touch a lock.

use std::{
    cell::UnsafeCell,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::error::{EvbusError, Result};

struct Cell {
    seq: AtomicUsize,
    value: UnsafeCell<u16>,
}

/// Bounded lock-free multi-producer single-consumer queue of event keys
pub struct IsrQueue {
    cells: Box<[Cell]>,
    mask: usize,
    enqueue_pos: AtomicUsize,
    dequeue_pos: AtomicUsize,
}

unsafe impl Send for IsrQueue {}
unsafe impl Sync for IsrQueue {}

impl IsrQueue {
    /// Create a queue; the capacity must be a power of two
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(EvbusError::invalid_parameter(
                "capacity",
                "Capacity must be a power of 2 and greater than 0",
            ));
        }

        let cells = (0..capacity)
            .map(|i| Cell {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(0),
            })
            .collect();

        Ok(Self {
            cells,
            mask: capacity - 1,
            enqueue_pos: AtomicUsize::new(0),
            dequeue_pos: AtomicUsize::new(0),
        })
    }

    /// Capacity in records
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Approximate number of queued records
    pub fn len(&self) -> usize {
        let enqueue = self.enqueue_pos.load(Ordering::Relaxed);
        let dequeue = self.dequeue_pos.load(Ordering::Relaxed);
        enqueue.wrapping_sub(dequeue).min(self.cells.len())
    }

    /// Whether the queue currently holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current fill level, 0.0 to 1.0
    pub fn utilization(&self) -> f32 {
        self.len() as f32 / self.cells.len() as f32
    }

    /// Push an event key; safe from any number of concurrent producers.
    ///
    /// Fails with `BufferFull` when the queue is at capacity.
    pub fn try_push(&self, event_key: u16) -> Result<()> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[pos & self.mask];
            let seq = cell.seq.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe {
                            *cell.value.get() = event_key;
                        }
                        cell.seq.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return Err(EvbusError::buffer_full("isr queue"));
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Pop the oldest record; single consumer only
    pub fn try_pop(&self) -> Option<u16> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[pos & self.mask];
            let seq = cell.seq.load(Ordering::Acquire);
            let diff = seq as isize - pos.wrapping_add(1) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { *cell.value.get() };
                        cell.seq
                            .store(pos.wrapping_add(self.mask).wrapping_add(1), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }
}

impl std::fmt::Debug for IsrQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsrQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
