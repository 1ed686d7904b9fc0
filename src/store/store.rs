//! Fixed-capacity key→bytes store with versioning and reference counting

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use crate::{
    error::{EvbusError, Result},
    pool::MemoryPool,
    store::{
        entry::{SlotCell, ValueBuf, EMPTY_KEY},
        EntryMeta, StoreStats,
    },
    sync::Semaphore,
    time::Clock,
};

/// Fixed-capacity key→bytes map with per-entry versioning
///
/// Capacity is fixed at construction; `set` for a new key fails once every
/// slot is live. All mutation is serialized by one binary semaphore with a
/// bounded wait, so a lock timeout is a normal, reported failure. Callbacks
/// that need a payload to outlive their invocation take a [`RetainedRef`],
/// which pins the entry against [`cleanup_unused`](Self::cleanup_unused).
#[derive(Debug)]
pub struct ObjectStore {
    slots: Box<[SlotCell]>,
    lock: Semaphore,
    pool: Option<Arc<MemoryPool>>,
    clock: Arc<dyn Clock>,
    stats: StoreStats,
}

// Slot values are only touched while holding `lock`; metadata is atomic.
unsafe impl Send for ObjectStore {}
unsafe impl Sync for ObjectStore {}

impl ObjectStore {
    /// Create a store with `capacity` slots and no backing pool
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_pool(capacity, None, clock)
    }

    /// Create a store backed by a block pool for value buffers.
    ///
    /// Payloads larger than the pool block size, or arriving while the pool
    /// is exhausted, transparently fall back to the heap.
    pub fn with_pool(
        capacity: usize,
        pool: Option<Arc<MemoryPool>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(EvbusError::invalid_parameter(
                "capacity",
                "Capacity must be greater than 0",
            ));
        }

        let slots = (0..capacity).map(|_| SlotCell::empty()).collect();

        Ok(Self {
            slots,
            lock: Semaphore::binary(),
            pool,
            clock,
            stats: StoreStats::default(),
        })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.key.load(Ordering::Acquire) != EMPTY_KEY)
            .count()
    }

    /// Whether no entry is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` currently has a live entry
    pub fn contains_key(&self, key: u16) -> bool {
        self.find_key(key).is_some()
    }

    /// Store statistics
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// The clock whose timestamps this store records
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Write `data` under `key`, stamping the current time and bumping the
    /// version.
    ///
    /// The value buffer is reallocated only when the payload length changes.
    /// A new key claims a free slot; with none left the store is unchanged
    /// and `CapacityExhausted` is returned. Returns the entry's new version.
    pub fn set(&self, key: u16, data: &[u8], flags: u8, timeout: Option<Duration>) -> Result<u64> {
        if data.is_empty() {
            return Err(EvbusError::invalid_parameter(
                "data",
                "Payload must not be empty",
            ));
        }

        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("object store"));
        }
        let result = unsafe { self.set_locked(key, data, flags) };
        self.lock.release();

        if result.is_ok() {
            self.stats.record_set();
        }
        result
    }

    unsafe fn set_locked(&self, key: u16, data: &[u8], flags: u8) -> Result<u64> {
        let now = self.clock.now_micros();

        if let Some(idx) = self.find_key(key) {
            let slot = &self.slots[idx];
            let value = &mut *slot.value.get();

            match value {
                Some(buf) if buf.len() == data.len() => buf.copy_from(data),
                _ => *value = Some(self.alloc_value(data)?),
            }

            slot.flags.store(flags, Ordering::Relaxed);
            slot.timestamp_us.store(now, Ordering::Release);
            Ok(slot.version.fetch_add(1, Ordering::Release) + 1)
        } else {
            let idx = self
                .find_free()
                .ok_or_else(|| EvbusError::capacity_exhausted("object store", self.slots.len()))?;
            let slot = &self.slots[idx];

            // Allocate before publishing the key, so a failed allocation
            // leaves the slot free and the store unmutated.
            let buf = self.alloc_value(data)?;
            *slot.value.get() = Some(buf);

            slot.flags.store(flags, Ordering::Relaxed);
            slot.ref_count.store(0, Ordering::Relaxed);
            slot.timestamp_us.store(now, Ordering::Relaxed);
            slot.version.store(1, Ordering::Release);
            slot.key.store(key as u32, Ordering::Release);
            Ok(1)
        }
    }

    fn alloc_value(&self, data: &[u8]) -> Result<ValueBuf> {
        if let Some(pool) = &self.pool {
            if data.len() <= pool.block_size() {
                match MemoryPool::alloc(pool, data.len()) {
                    Ok(mut buf) => {
                        buf.copy_from(data);
                        return Ok(ValueBuf::Pooled(buf));
                    }
                    Err(_) => self.stats.record_pool_fallback(),
                }
            }
        }
        Ok(ValueBuf::Heap(data.to_vec()))
    }

    /// Copy the payload for `key` into `out`, up to `out.len()` bytes.
    ///
    /// Returns the number of bytes written and the entry metadata.
    pub fn get(
        &self,
        key: u16,
        out: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(usize, EntryMeta)> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("object store"));
        }

        let result = unsafe {
            self.find_key(key)
                .and_then(|idx| {
                    let slot = &self.slots[idx];
                    (*slot.value.get()).as_ref().map(|buf| {
                        let n = buf.len().min(out.len());
                        out[..n].copy_from_slice(&buf.as_slice()[..n]);
                        (n, self.meta_of(slot))
                    })
                })
                .ok_or(EvbusError::KeyNotFound { key })
        };

        self.lock.release();

        if result.is_ok() {
            self.stats.record_get();
        }
        result
    }

    /// Copy the payload for `key` into a fresh vector
    pub fn get_vec(&self, key: u16, timeout: Option<Duration>) -> Result<(Vec<u8>, EntryMeta)> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("object store"));
        }

        let result = unsafe {
            self.find_key(key)
                .and_then(|idx| {
                    let slot = &self.slots[idx];
                    (*slot.value.get())
                        .as_ref()
                        .map(|buf| (buf.as_slice().to_vec(), self.meta_of(slot)))
                })
                .ok_or(EvbusError::KeyNotFound { key })
        };

        self.lock.release();

        if result.is_ok() {
            self.stats.record_get();
        }
        result
    }

    fn meta_of(&self, slot: &SlotCell) -> EntryMeta {
        EntryMeta {
            timestamp_us: slot.timestamp_us.load(Ordering::Relaxed),
            version: slot.version.load(Ordering::Acquire),
            flags: slot.flags.load(Ordering::Relaxed),
        }
    }

    /// Pin the entry for `key` against reclamation.
    ///
    /// The returned guard releases the reference when dropped, so retain and
    /// release cannot be mismatched through this path.
    pub fn retain(&self, key: u16, timeout: Option<Duration>) -> Result<RetainedRef<'_>> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("object store"));
        }

        let result = match self.find_key(key) {
            Some(idx) => {
                self.slots[idx].ref_count.fetch_add(1, Ordering::AcqRel);
                Ok(RetainedRef { store: self, key })
            }
            None => Err(EvbusError::KeyNotFound { key }),
        };

        self.lock.release();
        result
    }

    /// Explicitly drop one reference on `key`.
    ///
    /// A release with no matching retain saturates the count at zero and
    /// reports `RefCountUnderflow`; the entry is otherwise untouched.
    pub fn release(&self, key: u16, timeout: Option<Duration>) -> Result<()> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("object store"));
        }
        let result = self.release_ref(key);
        self.lock.release();
        result
    }

    fn release_ref(&self, key: u16) -> Result<()> {
        let idx = self.find_key(key).ok_or(EvbusError::KeyNotFound { key })?;
        let counted = self.slots[idx]
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));

        match counted {
            Ok(_) => Ok(()),
            Err(_) => Err(EvbusError::RefCountUnderflow { key }),
        }
    }

    /// Reclaim entries with no references whose age exceeds `max_age`.
    ///
    /// Returns the number of entries freed. Buffers go back to the pool (or
    /// heap) immediately.
    pub fn cleanup_unused(&self, max_age: Duration, timeout: Option<Duration>) -> Result<usize> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("object store"));
        }

        let now = self.clock.now_micros();
        let max_age_us = max_age.as_micros() as u64;
        let mut reclaimed = 0usize;

        for slot in self.slots.iter() {
            if slot.key.load(Ordering::Acquire) == EMPTY_KEY {
                continue;
            }
            if slot.ref_count.load(Ordering::Acquire) != 0 {
                continue;
            }
            let age = now.saturating_sub(slot.timestamp_us.load(Ordering::Relaxed));
            if age > max_age_us {
                slot.key.store(EMPTY_KEY, Ordering::Release);
                unsafe {
                    *slot.value.get() = None;
                }
                reclaimed += 1;
            }
        }

        self.lock.release();

        if reclaimed > 0 {
            self.stats.record_reclaimed(reclaimed as u64);
        }
        Ok(reclaimed)
    }

    /// Timestamp of the last write to `key`, without taking the store lock
    pub fn timestamp_of(&self, key: u16) -> Result<u64> {
        self.find_key(key)
            .map(|idx| self.slots[idx].timestamp_us.load(Ordering::Acquire))
            .ok_or(EvbusError::KeyNotFound { key })
    }

    /// Version of the entry for `key`, without taking the store lock
    pub fn version_of(&self, key: u16) -> Result<u64> {
        self.find_key(key)
            .map(|idx| self.slots[idx].version.load(Ordering::Acquire))
            .ok_or(EvbusError::KeyNotFound { key })
    }

    /// Current reference count on `key`
    pub fn ref_count_of(&self, key: u16) -> Result<u32> {
        self.find_key(key)
            .map(|idx| self.slots[idx].ref_count.load(Ordering::Acquire))
            .ok_or(EvbusError::KeyNotFound { key })
    }

    /// Next occupied slot at or after `from`, in slot-array order.
    ///
    /// Returns the slot index and its key. Ordering is storage order, not
    /// insertion order.
    pub fn next_occupied(&self, from: usize) -> Option<(usize, u16)> {
        self.slots[from.min(self.slots.len())..]
            .iter()
            .enumerate()
            .find_map(|(offset, slot)| {
                let key = slot.key.load(Ordering::Acquire);
                (key != EMPTY_KEY).then_some((from + offset, key as u16))
            })
    }

    /// Keys of all live entries, in slot-array order
    pub fn keys(&self) -> Vec<u16> {
        let mut keys = Vec::new();
        let mut idx = 0;
        while let Some((slot, key)) = self.next_occupied(idx) {
            keys.push(key);
            idx = slot + 1;
        }
        keys
    }

    fn find_key(&self, key: u16) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.key.load(Ordering::Acquire) == key as u32)
    }

    fn find_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.key.load(Ordering::Acquire) == EMPTY_KEY)
    }
}

/// RAII guard pinning one object store entry
///
/// Holds one reference on the entry; [`cleanup_unused`](ObjectStore::cleanup_unused)
/// will not reclaim it while any guard is alive. Dropped guards release the
/// reference with saturation, so the count cannot underflow.
#[derive(Debug)]
pub struct RetainedRef<'a> {
    store: &'a ObjectStore,
    key: u16,
}

impl RetainedRef<'_> {
    /// The pinned key
    pub fn key(&self) -> u16 {
        self.key
    }

    /// Read the current payload of the pinned entry
    pub fn value(&self, timeout: Option<Duration>) -> Result<(Vec<u8>, EntryMeta)> {
        self.store.get_vec(self.key, timeout)
    }
}

impl Drop for RetainedRef<'_> {
    fn drop(&mut self) {
        // Entries with a live reference are never reclaimed, so the slot is
        // still ours; the decrement itself saturates at zero.
        let _ = self.store.release_ref(self.key);
    }
}
