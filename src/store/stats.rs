//! Object store statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Object store statistics
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Total successful set operations
    pub sets: AtomicU64,
    /// Total successful get operations
    pub gets: AtomicU64,
    /// Lock acquisitions that timed out
    pub lock_timeouts: AtomicU64,
    /// Allocations that fell back to the heap because the pool was
    /// exhausted or absent
    pub pool_fallbacks: AtomicU64,
    /// Entries reclaimed by cleanup passes
    pub entries_reclaimed: AtomicU64,
}

impl StoreStats {
    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_fallback(&self) {
        self.pool_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reclaimed(&self, count: u64) {
        self.entries_reclaimed.fetch_add(count, Ordering::Relaxed);
    }
}
