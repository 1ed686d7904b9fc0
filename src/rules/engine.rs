//! Rule matching: membership, mask accumulation and freshness evaluation

use crate::{
    rules::rule::{Rule, RuleKind, NEVER_EXPIRE_MS},
    store::ObjectStore,
};

impl Rule {
    /// Whether a publish of `event_key` concerns this rule at all.
    ///
    /// OR and AND rules trigger on member events; MANUAL rules never
    /// auto-trigger. A single-entry cache short-circuits repeated queries
    /// for the same hot key.
    pub fn can_trigger(&self, event_key: u16) -> bool {
        if self.kind() == RuleKind::Manual {
            return false;
        }
        if let Some(cached) = self.cache_lookup(event_key) {
            return cached;
        }
        let hit = self.position_of(event_key).is_some();
        self.cache_store(event_key, hit);
        hit
    }

    /// Record (or clear) the arrival of `event_key` in the AND mask.
    ///
    /// No-op for OR and MANUAL rules and for non-member keys.
    pub fn update_mask(&self, event_key: u16, triggered: bool) {
        if self.kind() != RuleKind::And {
            return;
        }
        if let Some(pos) = self.position_of(event_key) {
            let bit = 1u32 << pos;
            if triggered {
                self.mask_fetch_or(bit);
            } else {
                self.mask_fetch_and(!bit);
            }
        }
    }

    /// Whether the rule's firing condition holds for a publish of
    /// `event_key`.
    ///
    /// OR delegates to membership; AND compares the accumulation mask
    /// against the full mask; MANUAL never matches automatically.
    pub fn matches(&self, event_key: u16) -> bool {
        match self.kind() {
            RuleKind::Or => self.can_trigger(event_key),
            RuleKind::And => self.trigger_mask() == self.full_mask(),
            RuleKind::Manual => false,
        }
    }

    /// Whether `event_key`'s stored payload is still fresh at `now_us`.
    ///
    /// Uses the rule's per-event timeout when present, otherwise
    /// `default_timeout_ms`; the [`NEVER_EXPIRE_MS`] sentinel disables the
    /// check. A key with no store entry is never fresh.
    pub fn check_timeout(
        &self,
        event_key: u16,
        store: &ObjectStore,
        default_timeout_ms: u32,
        now_us: u64,
    ) -> bool {
        let timeout_ms = self.timeout_for(event_key).unwrap_or(default_timeout_ms);
        if timeout_ms == NEVER_EXPIRE_MS {
            return true;
        }
        match store.timestamp_of(event_key) {
            Ok(ts) => now_us.saturating_sub(ts) <= timeout_ms as u64 * 1_000,
            Err(_) => false,
        }
    }

    /// Whether every member event individually passes its freshness check
    pub fn all_events_fresh(
        &self,
        store: &ObjectStore,
        default_timeout_ms: u32,
        now_us: u64,
    ) -> bool {
        self.events()
            .iter()
            .all(|&e| self.check_timeout(e, store, default_timeout_ms, now_us))
    }
}
