//! Counting semaphore with bounded waits
//!
//! Built on a mutex/condvar pair. Used with one permit as the store and bus
//! locks, and with `capacity`/`0` permits as the space/item gates of the
//! blocking ring buffer variants.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counting semaphore with timed acquisition
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` initial permits
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Create a binary semaphore (one permit), the coarse-grained lock shape
    pub fn binary() -> Self {
        Self::new(1)
    }

    /// Take one permit without blocking; returns false if none is available
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock().unwrap();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Take one permit, waiting up to `timeout`.
    ///
    /// `None` waits indefinitely. `Some(Duration::ZERO)` behaves exactly
    /// like [`try_acquire`](Self::try_acquire). Returns false if the wait
    /// budget elapsed without a permit becoming available.
    pub fn acquire(&self, timeout: Option<Duration>) -> bool {
        let mut permits = self.permits.lock().unwrap();

        match timeout {
            None => {
                while *permits == 0 {
                    permits = self.available.wait(permits).unwrap();
                }
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while *permits == 0 {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _result) = self
                        .available
                        .wait_timeout(permits, deadline - now)
                        .unwrap();
                    permits = guard;
                }
            }
        }

        *permits -= 1;
        true
    }

    /// Return one permit and wake a waiter
    pub fn release(&self) {
        let mut permits = self.permits.lock().unwrap();
        *permits += 1;
        drop(permits);
        self.available.notify_one();
    }

    /// Current number of available permits
    pub fn available_permits(&self) -> usize {
        *self.permits.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_acquire_exhaustion() {
        let sem = Semaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());

        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    fn test_zero_timeout_is_nonblocking() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert!(!sem.acquire(Some(Duration::ZERO)));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_timed_acquire_elapses() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert!(!sem.acquire(Some(Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_release_wakes_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || sem.acquire(Some(Duration::from_secs(5))))
        };

        thread::sleep(Duration::from_millis(10));
        sem.release();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_binary_semaphore_as_lock() {
        let sem = Semaphore::binary();
        assert!(sem.acquire(Some(Duration::ZERO)));
        assert!(!sem.acquire(Some(Duration::ZERO)));
        sem.release();
        assert_eq!(sem.available_permits(), 1);
    }
}
