//! Slot layout and value buffers for the object store

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8};

use crate::pool::PoolBuf;

/// Sentinel key marking a free slot
pub(crate) const EMPTY_KEY: u32 = u32::MAX;

/// Owned value buffer, pool-backed when the payload fits a block
#[derive(Debug)]
pub(crate) enum ValueBuf {
    Heap(Vec<u8>),
    Pooled(PoolBuf),
}

impl ValueBuf {
    pub(crate) fn len(&self) -> usize {
        match self {
            ValueBuf::Heap(v) => v.len(),
            ValueBuf::Pooled(b) => b.len(),
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            ValueBuf::Heap(v) => v.as_slice(),
            ValueBuf::Pooled(b) => b.as_slice(),
        }
    }

    /// Overwrite in place; `data` must match the stored length
    pub(crate) fn copy_from(&mut self, data: &[u8]) {
        match self {
            ValueBuf::Heap(v) => v.copy_from_slice(data),
            ValueBuf::Pooled(b) => b.copy_from(data),
        }
    }
}

/// One fixed slot of the store.
///
/// The key doubles as the occupancy flag (`EMPTY_KEY` = free). Metadata is
/// atomic so the rule engine can peek at timestamps without the store lock;
/// the value buffer itself is guarded by that lock.
#[derive(Debug)]
pub(crate) struct SlotCell {
    pub key: AtomicU32,
    pub version: AtomicU64,
    pub ref_count: AtomicU32,
    pub timestamp_us: AtomicU64,
    pub flags: AtomicU8,
    pub value: UnsafeCell<Option<ValueBuf>>,
}

impl SlotCell {
    pub(crate) fn empty() -> Self {
        Self {
            key: AtomicU32::new(EMPTY_KEY),
            version: AtomicU64::new(0),
            ref_count: AtomicU32::new(0),
            timestamp_us: AtomicU64::new(0),
            flags: AtomicU8::new(0),
            value: UnsafeCell::new(None),
        }
    }
}

/// Metadata returned alongside a payload read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// Monotonic microsecond timestamp of the last successful write
    pub timestamp_us: u64,
    /// Strictly-increasing write counter, never reset for a live entry
    pub version: u64,
    /// Application-defined flags, opaque to the store
    pub flags: u8,
}
