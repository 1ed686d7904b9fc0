//! Atomically-versioned object store
//!
//! The store is both the event payload cache and the timestamp oracle for
//! rule freshness checks: every successful write stamps the entry with the
//! shared monotonic clock and bumps its version. One store-wide binary
//! semaphore serializes mutation; version, reference count and timestamp
//! stay atomic so readers outside the lock observe consistent values.

pub mod entry;
pub mod stats;
pub mod store;

pub use entry::EntryMeta;
pub use stats::StoreStats;
pub use store::{ObjectStore, RetainedRef};
