//! Topic slots and subscriber callbacks

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{error::Result, rules::Rule};

/// Identifier handed back by `subscribe`, used to unsubscribe
pub type SubscriptionId = u64;

/// Payload view passed to subscriber callbacks
///
/// The payload is read-only for the duration of the callback; retain the
/// key on the object store if the bytes are needed after return.
#[derive(Debug)]
pub struct Delivery<'a> {
    /// Topic that fired
    pub topic_id: u16,
    /// Event key that triggered the fire; `None` for a manual fire of a
    /// rule with no member events
    pub event_key: Option<u16>,
    /// Latest stored payload for the triggering key (empty if none)
    pub payload: &'a [u8],
    /// Store timestamp of the payload, microseconds
    pub timestamp_us: u64,
    /// Store version of the payload
    pub version: u64,
}

/// Subscriber callback; a returned error is logged and counted but never
/// blocks delivery to later subscribers or the router
pub type SubscriberFn = Arc<dyn Fn(&Delivery<'_>) -> Result<()> + Send + Sync>;

pub(crate) struct Subscriber {
    pub id: SubscriptionId,
    pub callback: SubscriberFn,
}

/// One occupied topic slot: identity, rule, subscribers, fire counter
pub(crate) struct TopicEntry {
    pub topic_id: u16,
    pub rule: Rule,
    /// Insertion order is notification order
    pub subscribers: Vec<Subscriber>,
    pub fire_count: AtomicU64,
}

impl TopicEntry {
    pub(crate) fn new(topic_id: u16, rule: Rule) -> Self {
        Self {
            topic_id,
            rule,
            subscribers: Vec::new(),
            fire_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_fire(&self) -> u64 {
        self.fire_count.fetch_add(1, Ordering::Relaxed) + 1
    }
}
