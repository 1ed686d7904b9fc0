//! Fan-out of fired topics to external sinks
//!
//! The router maps a topic id onto any number of fan-out targets in a
//! fixed-capacity table: VFB entries forward the payload to an external
//! message-queue broadcaster through the [`VfbSink`] seam, custom entries
//! invoke an arbitrary callback. One target's failure never blocks the
//! remaining targets.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use tracing::warn;

use crate::error::{EvbusError, Result};

/// Send half of the external message-queue broadcaster
///
/// Supplied by the hosting layer; the router never implements broadcasting
/// itself.
pub trait VfbSink: Send + Sync {
    /// Forward a fired topic's payload under the external event key
    fn send(&self, external_key: u16, payload: &[u8]) -> Result<()>;
}

/// Custom fan-out callback: `(topic_id, payload)`
pub type RouteFn = Arc<dyn Fn(u16, &[u8]) -> Result<()> + Send + Sync>;

/// Discriminates route entries for [`TopicRouter::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Forward to the external message-queue broadcaster
    Vfb,
    /// Invoke a registered callback
    Custom,
}

#[derive(Clone)]
enum RouteTarget {
    Vfb { external_key: u16 },
    Custom { callback: RouteFn },
}

struct RouteEntry {
    topic_id: u16,
    target: RouteTarget,
}

/// Router statistics
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Successful per-target deliveries
    pub routed: AtomicU64,
    /// Per-target delivery failures (sink errors, missing sink, callback
    /// errors)
    pub failures: AtomicU64,
}

/// Fixed-capacity fan-out table keyed by topic id
pub struct TopicRouter {
    entries: Mutex<Box<[Option<RouteEntry>]>>,
    sink: Mutex<Option<Arc<dyn VfbSink>>>,
    stats: RouterStats,
}

impl TopicRouter {
    /// Create a router with `capacity` route entries
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EvbusError::invalid_parameter(
                "capacity",
                "Capacity must be greater than 0",
            ));
        }
        Ok(Self {
            entries: Mutex::new((0..capacity).map(|_| None).collect()),
            sink: Mutex::new(None),
            stats: RouterStats::default(),
        })
    }

    /// Install the external broadcaster's send half
    pub fn set_vfb_sink(&self, sink: Arc<dyn VfbSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    /// Router statistics
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Register a VFB forward of `topic_id` under `external_key`
    pub fn add_vfb(&self, topic_id: u16, external_key: u16) -> Result<()> {
        self.add_entry(RouteEntry {
            topic_id,
            target: RouteTarget::Vfb { external_key },
        })
    }

    /// Register a callback fan-out for `topic_id`
    pub fn add_custom(&self, topic_id: u16, callback: RouteFn) -> Result<()> {
        self.add_entry(RouteEntry {
            topic_id,
            target: RouteTarget::Custom { callback },
        })
    }

    fn add_entry(&self, entry: RouteEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.is_none()) {
            Some(slot) => {
                *slot = Some(entry);
                Ok(())
            }
            None => Err(EvbusError::capacity_exhausted("router entries", entries.len())),
        }
    }

    /// Clear the first entry matching `topic_id` and `kind`
    pub fn remove(&self, topic_id: u16, kind: RouteKind) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        for slot in entries.iter_mut() {
            let matched = match slot {
                Some(entry) if entry.topic_id == topic_id => matches!(
                    (&entry.target, kind),
                    (RouteTarget::Vfb { .. }, RouteKind::Vfb)
                        | (RouteTarget::Custom { .. }, RouteKind::Custom)
                ),
                _ => false,
            };
            if matched {
                *slot = None;
                return Ok(());
            }
        }
        Err(EvbusError::RouteNotFound { topic_id })
    }

    /// Number of occupied route entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().iter().flatten().count()
    }

    /// Whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch a fired topic's payload to every matching entry.
    ///
    /// Returns the number of targets delivered successfully. Failures are
    /// logged and counted but never block the remaining targets.
    pub fn route(&self, topic_id: u16, payload: &[u8]) -> usize {
        // Snapshot matching targets so dispatch runs without the table lock
        let targets: Vec<RouteTarget> = {
            let entries = self.entries.lock().unwrap();
            entries
                .iter()
                .flatten()
                .filter(|e| e.topic_id == topic_id)
                .map(|e| e.target.clone())
                .collect()
        };

        let sink = self.sink.lock().unwrap().clone();
        let mut delivered = 0usize;

        for target in targets {
            let outcome = match &target {
                RouteTarget::Vfb { external_key } => match &sink {
                    Some(sink) => sink.send(*external_key, payload),
                    None => Err(EvbusError::SinkUnavailable { topic_id }),
                },
                RouteTarget::Custom { callback } => callback(topic_id, payload),
            };

            match outcome {
                Ok(()) => {
                    delivered += 1;
                    self.stats.routed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(topic_id, error = %e, "route target failed");
                }
            }
        }

        delivered
    }
}

impl std::fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRouter")
            .field("entries", &self.len())
            .finish()
    }
}
