//! Fixed block-size, fixed block-count allocator backing object store values
//!
//! Value payloads in a control system cluster around a few small sizes, so
//! a block pool keeps the hot set-path off the general allocator and free of
//! fragmentation. The free list lives inside the free blocks themselves:
//! each free block's first word holds the offset of the next free block,
//! `usize::MAX` terminates the list.

use std::{
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tracing::warn;

use crate::error::{EvbusError, Result};

/// Pool allocator for fixed-size blocks
#[derive(Debug)]
pub struct MemoryPool {
    /// Base pointer to the owned backing region
    base_ptr: NonNull<u8>,
    /// Total size of the region
    total_size: usize,
    /// Size of each block (aligned up to pointer alignment)
    block_size: usize,
    /// Total number of blocks
    total_blocks: usize,
    /// Free list head, stored as a block offset (`usize::MAX` = empty)
    free_head: AtomicUsize,
    /// Number of allocated blocks
    allocated_count: AtomicUsize,
}

/// Snapshot of pool occupancy for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub block_size: usize,
    pub total_blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
}

impl MemoryPool {
    /// Create a pool of `block_count` blocks of `block_size` bytes each
    pub fn new(block_size: usize, block_count: usize) -> Result<Arc<Self>> {
        if block_size < std::mem::size_of::<usize>() {
            return Err(EvbusError::invalid_parameter(
                "block_size",
                "Block size must be at least pointer size",
            ));
        }
        if block_count == 0 {
            return Err(EvbusError::invalid_parameter(
                "block_count",
                "Block count must be greater than 0",
            ));
        }

        let aligned_block_size = Self::align_up(block_size, std::mem::align_of::<usize>());
        let total_size = aligned_block_size
            .checked_mul(block_count)
            .ok_or_else(|| EvbusError::memory("Pool size overflows"))?;

        let layout = std::alloc::Layout::from_size_align(total_size, std::mem::align_of::<usize>())
            .map_err(|_| EvbusError::memory("Failed to create layout for memory pool"))?;

        let base_ptr = unsafe {
            let ptr = std::alloc::alloc_zeroed(layout);
            NonNull::new(ptr).ok_or_else(|| EvbusError::memory("Failed to allocate memory pool"))?
        };

        let pool = Self {
            base_ptr,
            total_size,
            block_size: aligned_block_size,
            total_blocks: block_count,
            free_head: AtomicUsize::new(0),
            allocated_count: AtomicUsize::new(0),
        };

        pool.initialize_free_list();

        Ok(Arc::new(pool))
    }

    /// Get the usable block size
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Get total number of blocks
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// Get number of free blocks
    pub fn free_blocks(&self) -> usize {
        self.total_blocks - self.allocated_count.load(Ordering::Acquire)
    }

    /// Check if every block is handed out
    pub fn is_exhausted(&self) -> bool {
        self.allocated_count.load(Ordering::Acquire) >= self.total_blocks
    }

    /// Snapshot occupancy counters
    pub fn stats(&self) -> PoolStats {
        let used = self.allocated_count.load(Ordering::Acquire);
        PoolStats {
            block_size: self.block_size,
            total_blocks: self.total_blocks,
            used_blocks: used,
            free_blocks: self.total_blocks - used,
        }
    }

    /// Allocate a block for a payload of `size` bytes.
    ///
    /// Fails if `size` exceeds the block size or the pool is exhausted. The
    /// returned [`PoolBuf`] keeps the pool alive and gives the block back
    /// (zeroed) when dropped.
    pub fn alloc(pool: &Arc<Self>, size: usize) -> Result<PoolBuf> {
        let this = &**pool;
        if size > this.block_size {
            return Err(EvbusError::invalid_parameter(
                "size",
                "Requested size exceeds pool block size",
            ));
        }

        loop {
            let head_offset = this.free_head.load(Ordering::Acquire);

            if head_offset == usize::MAX {
                return Err(EvbusError::capacity_exhausted("memory pool", this.total_blocks));
            }

            let next_offset = unsafe {
                let head_ptr = this.base_ptr.as_ptr().add(head_offset) as *const usize;
                *head_ptr
            };

            match this.free_head.compare_exchange_weak(
                head_offset,
                next_offset,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    this.allocated_count.fetch_add(1, Ordering::Relaxed);

                    let ptr = unsafe { this.base_ptr.as_ptr().add(head_offset) };
                    // Clear the free-list link so the caller starts from zeroes
                    unsafe {
                        std::ptr::write_bytes(ptr, 0, std::mem::size_of::<usize>());
                    }

                    return Ok(PoolBuf {
                        ptr: NonNull::new(ptr)
                            .ok_or_else(|| EvbusError::memory("Failed to create block pointer"))?,
                        len: size,
                        pool: Arc::clone(pool),
                    });
                }
                Err(_) => {
                    std::hint::spin_loop();
                    continue;
                }
            }
        }
    }

    /// Return a block to the pool, zeroing it first
    fn release_block(&self, ptr: NonNull<u8>) -> Result<()> {
        let ptr_addr = ptr.as_ptr() as usize;
        let base_addr = self.base_ptr.as_ptr() as usize;

        if ptr_addr < base_addr || ptr_addr >= base_addr + self.total_size {
            return Err(EvbusError::invalid_parameter(
                "ptr",
                "Pointer not owned by this pool",
            ));
        }

        let offset = ptr_addr - base_addr;
        if offset % self.block_size != 0 {
            return Err(EvbusError::invalid_parameter(
                "ptr",
                "Pointer not aligned to block boundary",
            ));
        }

        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, self.block_size);
        }

        loop {
            let current_head = self.free_head.load(Ordering::Acquire);

            unsafe {
                let block_ptr = ptr.as_ptr() as *mut usize;
                *block_ptr = current_head;
            }

            match self.free_head.compare_exchange_weak(
                current_head,
                offset,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.allocated_count.fetch_sub(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(_) => {
                    std::hint::spin_loop();
                    continue;
                }
            }
        }
    }

    fn align_up(value: usize, align: usize) -> usize {
        (value + align - 1) & !(align - 1)
    }

    /// Link every block into the free list
    fn initialize_free_list(&self) {
        unsafe {
            for i in 0..self.total_blocks - 1 {
                let block_ptr = self.base_ptr.as_ptr().add(i * self.block_size) as *mut usize;
                *block_ptr = (i + 1) * self.block_size;
            }

            let last_block_ptr = self
                .base_ptr
                .as_ptr()
                .add((self.total_blocks - 1) * self.block_size) as *mut usize;
            *last_block_ptr = usize::MAX;
        }

        self.free_head.store(0, Ordering::Release);
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        let layout = std::alloc::Layout::from_size_align(
            self.total_size,
            std::mem::align_of::<usize>(),
        )
        .unwrap();
        unsafe {
            std::alloc::dealloc(self.base_ptr.as_ptr(), layout);
        }
    }
}

unsafe impl Send for MemoryPool {}
unsafe impl Sync for MemoryPool {}

/// Owning handle to one pool block
///
/// Holds the pool alive, exposes the payload prefix of the block, and
/// returns the block on drop. Block bookkeeping cannot leak or double-free
/// through this handle.
#[derive(Debug)]
pub struct PoolBuf {
    ptr: NonNull<u8>,
    len: usize,
    pool: Arc<MemoryPool>,
}

impl PoolBuf {
    /// Length of the payload stored in this block
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Full usable capacity of the underlying block
    pub fn capacity(&self) -> usize {
        self.pool.block_size
    }

    /// Payload bytes
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable payload bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Overwrite the payload; `data` must match the stored length
    pub fn copy_from(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len(), self.len);
        self.as_mut_slice().copy_from_slice(data);
    }
}

impl Drop for PoolBuf {
    fn drop(&mut self) {
        if let Err(e) = self.pool.release_block(self.ptr) {
            warn!(error = %e, "failed to return block to pool");
        }
    }
}

unsafe impl Send for PoolBuf {}
unsafe impl Sync for PoolBuf {}
