//! Bus statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Bus statistics
#[derive(Debug, Default)]
pub struct BusStats {
    /// Task-context publishes accepted
    pub events_published: AtomicU64,
    /// Records accepted on the ISR queue
    pub events_isr_queued: AtomicU64,
    /// ISR publishes dropped because the queue was full
    pub isr_overflows: AtomicU64,
    /// Records drained from the ISR queue into task-context publishes
    pub isr_drained: AtomicU64,
    /// Topic fires delivered
    pub topic_fires: AtomicU64,
    /// Subscriber callbacks invoked
    pub callbacks_invoked: AtomicU64,
    /// Subscriber callbacks that returned an error
    pub callback_errors: AtomicU64,
    /// Bus lock acquisitions that timed out
    pub lock_timeouts: AtomicU64,
}

impl BusStats {
    pub fn record_publish(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_isr_queued(&self) {
        self.events_isr_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_isr_overflow(&self) {
        self.isr_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_isr_drained(&self, count: u64) {
        self.isr_drained.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_fire(&self) {
        self.topic_fires.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback(&self) {
        self.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_error(&self) {
        self.callback_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }
}
