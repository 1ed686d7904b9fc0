//! The topic bus: rules, subscribers and the publish paths
//!
//! A [`TopicBus`] owns a fixed array of topic slots, a reference to the
//! object store, and the ISR queue that carries interrupt-context publishes
//! into task context. It is an explicit context object: create as many
//! independent buses as needed and pass them around by `Arc`.

pub mod bus;
pub mod config;
pub mod isr_queue;
pub mod stats;
pub mod topic;

pub use bus::TopicBus;
pub use config::BusConfig;
pub use isr_queue::IsrQueue;
pub use stats::BusStats;
pub use topic::{Delivery, SubscriberFn, SubscriptionId};
