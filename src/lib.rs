//! # evbus - Statically-Allocated Publish/Subscribe Event Bus
//!
//! evbus is an in-process event bus for resource-constrained control
//! systems. Producers publish typed events identified by small integer
//! keys; topics fire when a configured combination of events has occurred
//! within per-event freshness windows, and dispatch the latest payload to
//! subscriber callbacks and external sinks.
//!
//! ## Features
//!
//! - **Fixed capacities everywhere**: topic slots, store slots, queue and
//!   route tables are sized at construction and never grow
//! - **Two publish paths**: a task path that may block with a bounded
//!   timeout, and an ISR path that only touches atomics
//! - **Versioned object store**: every write stamps a monotonic timestamp
//!   and bumps an atomic version, doubling as the freshness oracle
//! - **OR/AND/MANUAL rules**: per-event timeout windows, 32-bit AND
//!   accumulation mask with full-cycle reset semantics
//! - **Pool-backed payloads**: fixed-block allocator keeps the hot set
//!   path off the general heap, with transparent fallback
//! - **Explicit context objects**: no globals, any number of independent
//!   bus instances
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     TopicBus                         │
//! ├──────────────────────────────────────────────────────┤
//! │  Topic slots (rules + subscribers) │  ISR queue      │
//! │  - OR / AND / MANUAL matching      │  - MPSC, lock-  │
//! │  - trigger mask accumulation       │    free push    │
//! └──────────────────────────────────────────────────────┘
//!      │                  │                    ▲
//!      ▼                  ▼                    │ drains
//! ┌───────────┐    ┌─────────────┐      ┌─────────────┐
//! │TopicRouter│    │ ObjectStore │      │ TopicServer │
//! │ (fan-out) │    │ (+ pool)    │      │ (periodic)  │
//! └───────────┘    └─────────────┘      └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use evbus::{BusConfig, ObjectStore, MonotonicClock, Rule, RuleKind, TopicBus};
//!
//! let clock = Arc::new(MonotonicClock::new());
//! let store = Arc::new(ObjectStore::new(16, clock).unwrap());
//! let bus = TopicBus::new(BusConfig::default(), store.clone()).unwrap();
//!
//! bus.rule_create(1, Rule::new(RuleKind::Or, &[10, 20]).unwrap(), None)
//!     .unwrap();
//! bus.subscribe(
//!     1,
//!     Arc::new(|delivery| {
//!         println!("topic {} fired: {:?}", delivery.topic_id, delivery.payload);
//!         Ok(())
//!     }),
//!     None,
//! )
//! .unwrap();
//!
//! let wait = Some(Duration::from_millis(100));
//! store.set(10, b"reading", 0, wait).unwrap();
//! bus.publish_event(10, wait).unwrap();
//! ```

// Core modules
pub mod bus;
pub mod error;
pub mod pool;
pub mod ringbuf;
pub mod router;
pub mod rules;
pub mod server;
pub mod store;
pub mod sync;
pub mod time;

// Main API re-exports
pub use bus::{BusConfig, BusStats, Delivery, IsrQueue, SubscriberFn, SubscriptionId, TopicBus};
pub use error::{EvbusError, Result};
pub use pool::{MemoryPool, PoolBuf, PoolStats};
pub use ringbuf::{BlockingRing, Consumer, Producer, RingBuffer};
pub use router::{RouteFn, RouteKind, RouterStats, TopicRouter, VfbSink};
pub use rules::{Rule, RuleKind, MAX_RULE_EVENTS, NEVER_EXPIRE_MS};
pub use server::{ServerStats, TopicServer};
pub use store::{EntryMeta, ObjectStore, RetainedRef, StoreStats};
pub use sync::Semaphore;
pub use time::{Clock, ManualClock, MonotonicClock};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default number of topic slots per bus
    pub const DEFAULT_MAX_TOPICS: usize = 32;

    /// Default number of subscribers per topic
    pub const DEFAULT_MAX_SUBSCRIBERS: usize = 8;

    /// Default ISR queue capacity (power of two)
    pub const DEFAULT_ISR_QUEUE_CAPACITY: usize = 64;

    /// Default freshness window for rule members without an explicit
    /// per-event timeout (5 seconds)
    pub const DEFAULT_EVENT_TIMEOUT_MS: u32 = 5_000;

    /// Default wait budget for bus and store locks
    pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 100;

    /// Default topic server poll period
    pub const DEFAULT_SERVER_PERIOD_MS: u64 = 10;

    /// Default route table capacity
    pub const DEFAULT_MAX_ROUTES: usize = 16;
}
