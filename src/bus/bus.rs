//! Core topic bus: publish paths, rule installation and subscriptions

use std::{
    cell::UnsafeCell,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    bus::{
        config::BusConfig,
        isr_queue::IsrQueue,
        stats::BusStats,
        topic::{Delivery, Subscriber, SubscriberFn, SubscriptionId, TopicEntry},
    },
    error::{EvbusError, Result},
    router::TopicRouter,
    rules::{Rule, RuleKind},
    store::{EntryMeta, ObjectStore},
};

/// Publish/subscribe bus over a fixed array of topic slots
///
/// Two publish paths exist: [`publish_event`](Self::publish_event) runs in
/// task context under the bus lock and evaluates rules immediately;
/// [`publish_isr`](Self::publish_isr) never blocks, pushing a record onto
/// the ISR queue for the topic server to replay.
///
/// Subscriber callbacks run while the bus lock is held. A callback must not
/// call back into the same bus; such a call would contend with its own lock
/// and fail with a lock timeout.
pub struct TopicBus {
    /// Topic slots, guarded by `lock`
    slots: UnsafeCell<Box<[Option<TopicEntry>]>>,
    lock: crate::sync::Semaphore,
    store: Arc<ObjectStore>,
    isr_queue: IsrQueue,
    router: Mutex<Option<Arc<TopicRouter>>>,
    config: BusConfig,
    stats: BusStats,
    next_subscription: AtomicU64,
}

// Slots are only touched while holding `lock`.
unsafe impl Send for TopicBus {}
unsafe impl Sync for TopicBus {}

impl TopicBus {
    /// Create a bus over `store` with the given configuration
    pub fn new(config: BusConfig, store: Arc<ObjectStore>) -> Result<Self> {
        config.validate()?;

        let slots = (0..config.max_topics).map(|_| None).collect();
        let isr_queue = IsrQueue::new(config.isr_queue_capacity)?;

        Ok(Self {
            slots: UnsafeCell::new(slots),
            lock: crate::sync::Semaphore::binary(),
            store,
            isr_queue,
            router: Mutex::new(None),
            config,
            stats: BusStats::default(),
            next_subscription: AtomicU64::new(0),
        })
    }

    /// The bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// The object store this bus reads payloads from
    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    /// Bus statistics
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// Number of records currently queued on the ISR path
    pub fn isr_queue_len(&self) -> usize {
        self.isr_queue.len()
    }

    /// Attach a router; every subsequent fire is fanned out through it
    pub fn set_router(&self, router: Arc<TopicRouter>) {
        *self.router.lock().unwrap() = Some(router);
    }

    /// Install (or replace) the rule for `topic_id`.
    ///
    /// An existing topic keeps its subscribers; its previous rule and
    /// accumulation state are dropped. A new topic claims a free slot, or
    /// fails with `CapacityExhausted` leaving the bus unchanged.
    pub fn rule_create(&self, topic_id: u16, rule: Rule, timeout: Option<Duration>) -> Result<()> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("topic bus"));
        }

        let slots = unsafe { &mut *self.slots.get() };
        let result = if let Some(entry) = slots
            .iter_mut()
            .flatten()
            .find(|e| e.topic_id == topic_id)
        {
            entry.rule = rule;
            Ok(())
        } else if let Some(slot) = slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(TopicEntry::new(topic_id, rule));
            Ok(())
        } else {
            Err(EvbusError::capacity_exhausted(
                "topic slots",
                self.config.max_topics,
            ))
        };

        self.lock.release();

        if result.is_ok() {
            debug!(topic_id, "rule installed");
        }
        result
    }

    /// Register a callback on `topic_id`; callbacks are notified in
    /// subscription order
    pub fn subscribe(
        &self,
        topic_id: u16,
        callback: SubscriberFn,
        timeout: Option<Duration>,
    ) -> Result<SubscriptionId> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("topic bus"));
        }

        let slots = unsafe { &mut *self.slots.get() };
        let result = match slots.iter_mut().flatten().find(|e| e.topic_id == topic_id) {
            Some(entry) => {
                if entry.subscribers.len() >= self.config.max_subscribers_per_topic {
                    Err(EvbusError::capacity_exhausted(
                        "topic subscribers",
                        self.config.max_subscribers_per_topic,
                    ))
                } else {
                    let id = self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1;
                    entry.subscribers.push(Subscriber { id, callback });
                    Ok(id)
                }
            }
            None => Err(EvbusError::TopicNotFound { topic_id }),
        };

        self.lock.release();
        result
    }

    /// Remove a subscription previously returned by
    /// [`subscribe`](Self::subscribe)
    pub fn unsubscribe(
        &self,
        topic_id: u16,
        id: SubscriptionId,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("topic bus"));
        }

        let slots = unsafe { &mut *self.slots.get() };
        let result = match slots.iter_mut().flatten().find(|e| e.topic_id == topic_id) {
            Some(entry) => match entry.subscribers.iter().position(|s| s.id == id) {
                Some(pos) => {
                    entry.subscribers.remove(pos);
                    Ok(())
                }
                None => Err(EvbusError::SubscriptionNotFound { topic_id, id }),
            },
            None => Err(EvbusError::TopicNotFound { topic_id }),
        };

        self.lock.release();
        result
    }

    /// Task-context publish of `event_key`.
    ///
    /// Scans all occupied topic slots under the bus lock. OR rules
    /// referencing the key fire immediately. AND rules record the arrival
    /// and, once the accumulation mask is full, fire only if every member
    /// event is individually fresh; the mask resets after the cycle whether
    /// or not the fire was suppressed by stale data.
    pub fn publish_event(&self, event_key: u16, timeout: Option<Duration>) -> Result<()> {
        if self.config.enable_stats {
            self.stats.record_publish();
        }

        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("topic bus"));
        }

        let slots = unsafe { &*self.slots.get() };
        for entry in slots.iter().flatten() {
            match entry.rule.kind() {
                RuleKind::Or => {
                    if entry.rule.can_trigger(event_key) {
                        self.fire_topic(entry, Some(event_key), timeout);
                    }
                }
                RuleKind::And => {
                    if entry.rule.can_trigger(event_key) {
                        entry.rule.update_mask(event_key, true);
                        if entry.rule.matches(event_key) {
                            let now = self.store.clock().now_micros();
                            if entry.rule.all_events_fresh(
                                &self.store,
                                self.config.default_event_timeout_ms,
                                now,
                            ) {
                                self.fire_topic(entry, Some(event_key), timeout);
                            }
                            // A completed cycle restarts from empty, fired or not
                            entry.rule.reset_mask();
                        }
                    }
                }
                RuleKind::Manual => {}
            }
        }

        self.lock.release();
        Ok(())
    }

    /// Fire `topic_id` directly, regardless of its rule kind.
    ///
    /// The payload is selected by the rule's first member event, if any.
    /// This is the only path that fires a MANUAL topic. An AND rule's
    /// accumulation state is left untouched.
    pub fn publish_manual(&self, topic_id: u16, timeout: Option<Duration>) -> Result<()> {
        if !self.lock.acquire(timeout) {
            self.stats.record_lock_timeout();
            return Err(EvbusError::lock_timeout("topic bus"));
        }

        let slots = unsafe { &*self.slots.get() };
        let result = match slots.iter().flatten().find(|e| e.topic_id == topic_id) {
            Some(entry) => {
                let key = entry.rule.events().first().copied();
                self.fire_topic(entry, key, timeout);
                Ok(())
            }
            None => Err(EvbusError::TopicNotFound { topic_id }),
        };

        self.lock.release();
        result
    }

    /// Interrupt-context publish of `event_key`.
    ///
    /// Never blocks and never touches the bus lock; the record is queued
    /// for the topic server to replay in task context. Safe from multiple
    /// concurrent interrupt sources. Fails with `BufferFull` when the queue
    /// is at capacity; the event is then lost to this path.
    pub fn publish_isr(&self, event_key: u16) -> Result<()> {
        match self.isr_queue.try_push(event_key) {
            Ok(()) => {
                if self.config.enable_stats {
                    self.stats.record_isr_queued();
                }
                Ok(())
            }
            Err(e) => {
                self.stats.record_isr_overflow();
                Err(e)
            }
        }
    }

    /// Drain the ISR queue, replaying each record through
    /// [`publish_event`](Self::publish_event) in FIFO order.
    ///
    /// A record whose replay fails (for instance on lock timeout) is logged
    /// and dropped; draining continues. Returns the number of records
    /// drained.
    pub fn process_isr_queue(&self, timeout: Option<Duration>) -> Result<usize> {
        let mut drained = 0usize;
        while let Some(event_key) = self.isr_queue.try_pop() {
            drained += 1;
            if let Err(e) = self.publish_event(event_key, timeout) {
                warn!(event_key, error = %e, "dropping queued ISR event");
            }
        }

        if drained > 0 && self.config.enable_stats {
            self.stats.record_isr_drained(drained as u64);
        }
        Ok(drained)
    }

    /// Number of occupied topic slots
    pub fn topic_count(&self) -> Result<usize> {
        if !self.lock.acquire(Some(self.config.lock_timeout())) {
            return Err(EvbusError::lock_timeout("topic bus"));
        }
        let count = unsafe { &*self.slots.get() }.iter().flatten().count();
        self.lock.release();
        Ok(count)
    }

    /// Whether `topic_id` has an installed rule
    pub fn has_topic(&self, topic_id: u16) -> Result<bool> {
        if !self.lock.acquire(Some(self.config.lock_timeout())) {
            return Err(EvbusError::lock_timeout("topic bus"));
        }
        let found = unsafe { &*self.slots.get() }
            .iter()
            .flatten()
            .any(|e| e.topic_id == topic_id);
        self.lock.release();
        Ok(found)
    }

    /// Number of times `topic_id` has fired
    pub fn fire_count_of(&self, topic_id: u16) -> Result<u64> {
        if !self.lock.acquire(Some(self.config.lock_timeout())) {
            return Err(EvbusError::lock_timeout("topic bus"));
        }
        let result = unsafe { &*self.slots.get() }
            .iter()
            .flatten()
            .find(|e| e.topic_id == topic_id)
            .map(|e| e.fire_count.load(Ordering::Relaxed))
            .ok_or(EvbusError::TopicNotFound { topic_id });
        self.lock.release();
        result
    }

    /// Deliver one fire: read the triggering payload, notify subscribers in
    /// order, then the router. Caller holds the bus lock.
    fn fire_topic(&self, entry: &TopicEntry, event_key: Option<u16>, timeout: Option<Duration>) {
        let empty_meta = EntryMeta {
            timestamp_us: 0,
            version: 0,
            flags: 0,
        };
        let (payload, meta) = match event_key {
            Some(key) => match self.store.get_vec(key, timeout) {
                Ok((bytes, meta)) => (bytes, meta),
                Err(e) => {
                    warn!(topic_id = entry.topic_id, event_key = key, error = %e,
                        "firing with empty payload, store read failed");
                    (Vec::new(), empty_meta)
                }
            },
            None => (Vec::new(), empty_meta),
        };

        let delivery = Delivery {
            topic_id: entry.topic_id,
            event_key,
            payload: &payload,
            timestamp_us: meta.timestamp_us,
            version: meta.version,
        };

        entry.record_fire();
        if self.config.enable_stats {
            self.stats.record_fire();
        }

        for subscriber in &entry.subscribers {
            if self.config.enable_stats {
                self.stats.record_callback();
            }
            if let Err(e) = (subscriber.callback)(&delivery) {
                self.stats.record_callback_error();
                warn!(topic_id = entry.topic_id, subscription = subscriber.id, error = %e,
                    "subscriber callback failed");
            }
        }

        let router = self.router.lock().unwrap().clone();
        if let Some(router) = router {
            router.route(entry.topic_id, &payload);
        }
    }
}

impl fmt::Debug for TopicBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicBus")
            .field("config", &self.config)
            .field("isr_queue", &self.isr_queue)
            .finish()
    }
}
