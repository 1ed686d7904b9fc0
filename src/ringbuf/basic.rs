//! Basic lock-free single-producer single-consumer ring buffer

use std::{
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::error::{EvbusError, Result};

/// Lock-free single-producer single-consumer ring buffer
///
/// Indices increase monotonically; the occupied count is always derived as
/// `write_pos - read_pos` and never stored. The payload copy is ordered
/// before the index publication (release store, acquire load), which is the
/// whole correctness argument for the single-producer/single-consumer case.
///
/// Calling the producer side from more than one thread concurrently is not
/// supported; route multi-producer traffic through `bus::IsrQueue` instead.
#[derive(Debug)]
pub struct RingBuffer<T> {
    /// Buffer storage
    buffer: NonNull<T>,
    /// Capacity in items
    capacity: usize,
    /// Mask for fast modulo when the capacity is a power of two
    mask: usize,
    /// Whether index arithmetic may use the mask
    pow2: bool,
    /// Write position (producer)
    write_pos: AtomicUsize,
    /// Read position (consumer)
    read_pos: AtomicUsize,
    /// Phantom data for type safety
    _phantom: PhantomData<T>,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer; the capacity must be a power of two
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(EvbusError::invalid_parameter(
                "capacity",
                "Capacity must be a power of 2 and greater than 0",
            ));
        }
        Self::allocate(capacity, true)
    }

    /// Create a ring buffer with an arbitrary non-zero capacity.
    ///
    /// Slot indices are computed with a modulo instead of a mask; prefer
    /// [`new`](Self::new) where the capacity can be a power of two.
    pub fn with_any_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EvbusError::invalid_parameter(
                "capacity",
                "Capacity must be greater than 0",
            ));
        }
        Self::allocate(capacity, capacity.is_power_of_two())
    }

    fn allocate(capacity: usize, pow2: bool) -> Result<Self> {
        let layout = std::alloc::Layout::array::<T>(capacity)
            .map_err(|_| EvbusError::memory("Failed to create layout for ring buffer"))?;

        let buffer = unsafe {
            let ptr = std::alloc::alloc(layout) as *mut T;
            NonNull::new(ptr).ok_or_else(|| EvbusError::memory("Failed to allocate ring buffer"))?
        };

        Ok(Self {
            buffer,
            capacity,
            mask: capacity.wrapping_sub(1),
            pow2,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            _phantom: PhantomData,
        })
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        if self.pow2 {
            index & self.mask
        } else {
            index % self.capacity
        }
    }

    /// Get the capacity of the ring buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the current number of elements in the buffer
    pub fn len(&self) -> usize {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        write_pos.wrapping_sub(read_pos)
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        write_pos == read_pos
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Get available space for writing
    pub fn available_space(&self) -> usize {
        self.capacity - self.len()
    }

    /// Current fill level, 0.0 to 1.0
    pub fn utilization(&self) -> f32 {
        self.len() as f32 / self.capacity as f32
    }

    /// Create a producer handle
    pub fn producer(&self) -> Producer<'_, T> {
        Producer {
            buffer: self.buffer,
            capacity: self.capacity,
            mask: self.mask,
            pow2: self.pow2,
            write_pos: &self.write_pos,
            read_pos: &self.read_pos,
            _phantom: PhantomData,
        }
    }

    /// Create a consumer handle
    pub fn consumer(&self) -> Consumer<'_, T> {
        Consumer {
            buffer: self.buffer,
            capacity: self.capacity,
            mask: self.mask,
            pow2: self.pow2,
            write_pos: &self.write_pos,
            read_pos: &self.read_pos,
            _phantom: PhantomData,
        }
    }

    /// Drop all buffered items and reinitialize the indices.
    ///
    /// Not safe to call while producer or consumer operations are in flight.
    pub fn reset(&self) {
        let consumer = self.consumer();
        while consumer.try_pop().is_ok() {}
        self.write_pos.store(0, Ordering::Release);
        self.read_pos.store(0, Ordering::Release);
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // Drop any remaining elements
        while !self.is_empty() {
            let read_pos = self.read_pos.load(Ordering::Acquire);
            let index = self.slot(read_pos);

            unsafe {
                std::ptr::drop_in_place(self.buffer.as_ptr().add(index));
            }

            self.read_pos
                .store(read_pos.wrapping_add(1), Ordering::Release);
        }

        // Deallocate buffer
        let layout = std::alloc::Layout::array::<T>(self.capacity).unwrap();
        unsafe {
            std::alloc::dealloc(self.buffer.as_ptr() as *mut u8, layout);
        }
    }
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

/// Producer handle for writing to the ring buffer
#[derive(Debug)]
pub struct Producer<'a, T> {
    buffer: NonNull<T>,
    capacity: usize,
    mask: usize,
    pow2: bool,
    write_pos: &'a AtomicUsize,
    read_pos: &'a AtomicUsize,
    _phantom: PhantomData<T>,
}

impl<'a, T> Producer<'a, T> {
    #[inline]
    fn slot(&self, index: usize) -> usize {
        if self.pow2 {
            index & self.mask
        } else {
            index % self.capacity
        }
    }

    /// Try to push an item; fails with `BufferFull` when no space is left.
    ///
    /// Touches only the atomic indices, so it is safe to call from an
    /// interrupt-equivalent context as long as it remains the only producer.
    pub fn try_push(&self, item: T) -> Result<()> {
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let read_pos = self.read_pos.load(Ordering::Acquire);

        if write_pos.wrapping_sub(read_pos) >= self.capacity {
            return Err(EvbusError::buffer_full("RingBuffer"));
        }

        let index = self.slot(write_pos);

        unsafe {
            std::ptr::write(self.buffer.as_ptr().add(index), item);
        }

        self.write_pos
            .store(write_pos.wrapping_add(1), Ordering::Release);

        Ok(())
    }

    /// Get available space for writing
    pub fn available_space(&self) -> usize {
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        self.capacity - write_pos.wrapping_sub(read_pos)
    }
}

/// Consumer handle for reading from the ring buffer
#[derive(Debug)]
pub struct Consumer<'a, T> {
    buffer: NonNull<T>,
    capacity: usize,
    mask: usize,
    pow2: bool,
    write_pos: &'a AtomicUsize,
    read_pos: &'a AtomicUsize,
    _phantom: PhantomData<T>,
}

impl<'a, T> Consumer<'a, T> {
    #[inline]
    fn slot(&self, index: usize) -> usize {
        if self.pow2 {
            index & self.mask
        } else {
            index % self.capacity
        }
    }

    /// Try to pop an item; fails with `BufferEmpty` when nothing is queued
    pub fn try_pop(&self) -> Result<T> {
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Acquire);

        if read_pos == write_pos {
            return Err(EvbusError::buffer_empty("RingBuffer"));
        }

        let index = self.slot(read_pos);

        let item = unsafe { std::ptr::read(self.buffer.as_ptr().add(index)) };

        self.read_pos
            .store(read_pos.wrapping_add(1), Ordering::Release);

        Ok(item)
    }

    /// Peek at the next item without consuming it
    pub fn peek(&self) -> Result<&T> {
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Acquire);

        if read_pos == write_pos {
            return Err(EvbusError::buffer_empty("RingBuffer"));
        }

        let index = self.slot(read_pos);

        Ok(unsafe { &*self.buffer.as_ptr().add(index) })
    }

    /// Get the number of available items
    pub fn available_items(&self) -> usize {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        write_pos.wrapping_sub(read_pos)
    }
}
