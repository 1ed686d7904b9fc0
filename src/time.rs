//! Monotonic clock abstraction used for timestamps and freshness checks
//!
//! All timestamps recorded by the object store and compared by rule
//! freshness checks must come from a single monotonic clock instance,
//! otherwise timeout correlation across independently-arriving events is
//! meaningless. The clock is injected so tests can drive time manually.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic microsecond clock
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in microseconds since an arbitrary fixed origin
    fn now_micros(&self) -> u64;
}

/// Wall-clock independent monotonic clock backed by `std::time::Instant`
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock with its origin at the moment of construction
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Manually-advanced clock for deterministic freshness tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `micros` microseconds
    pub fn advance(&self, micros: u64) {
        self.now_us.fetch_add(micros, Ordering::SeqCst);
    }

    /// Set the clock to an absolute microsecond value
    pub fn set(&self, micros: u64) {
        self.now_us.store(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now_micros();
        assert!(b > a);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_micros(), 0);
        clock.advance(1_500);
        assert_eq!(clock.now_micros(), 1_500);
        clock.set(10);
        assert_eq!(clock.now_micros(), 10);
    }
}
