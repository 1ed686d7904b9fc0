//! Rule definition: trigger kind, member events and per-event timeouts

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{EvbusError, Result};

/// Maximum member events per rule; the accumulation mask is one 32-bit word
pub const MAX_RULE_EVENTS: usize = 32;

/// Per-event timeout sentinel disabling the freshness check entirely
pub const NEVER_EXPIRE_MS: u32 = u32::MAX;

/// Trigger semantics of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Any member event fires the topic
    Or,
    /// All member events must arrive within their freshness windows; the
    /// accumulation mask then resets for the next cycle
    And,
    /// Fires only on an explicit manual publish
    Manual,
}

/// A topic's trigger condition
///
/// The member event order is significant: an AND rule's accumulation mask
/// assigns bit `i` to `events[i]`. The optional timeout array is parallel
/// to the events; missing entries use the bus-wide default.
#[derive(Debug)]
pub struct Rule {
    kind: RuleKind,
    events: Box<[u16]>,
    timeouts_ms: Option<Box<[u32]>>,
    /// AND accumulation state; bit `i` set = `events[i]` has arrived
    trigger_mask: AtomicU32,
    /// Packed single-entry membership cache: bits 0..16 key, bit 16 result,
    /// bit 17 valid
    query_cache: AtomicU32,
}

impl Rule {
    /// Create a rule without per-event timeouts
    pub fn new(kind: RuleKind, events: &[u16]) -> Result<Self> {
        Self::build(kind, events, None)
    }

    /// Create a rule with a per-event timeout array parallel to `events`.
    ///
    /// Use [`NEVER_EXPIRE_MS`] to disable the freshness check for a member.
    pub fn with_timeouts(kind: RuleKind, events: &[u16], timeouts_ms: &[u32]) -> Result<Self> {
        if timeouts_ms.len() != events.len() {
            return Err(EvbusError::invalid_parameter(
                "timeouts_ms",
                "Timeout array must parallel the event array",
            ));
        }
        Self::build(kind, events, Some(timeouts_ms.to_vec().into_boxed_slice()))
    }

    fn build(kind: RuleKind, events: &[u16], timeouts_ms: Option<Box<[u32]>>) -> Result<Self> {
        if events.len() > MAX_RULE_EVENTS {
            return Err(EvbusError::invalid_parameter(
                "events",
                "A rule supports at most 32 member events",
            ));
        }
        if events.is_empty() && kind != RuleKind::Manual {
            return Err(EvbusError::invalid_parameter(
                "events",
                "OR and AND rules need at least one member event",
            ));
        }

        for (i, &event) in events.iter().enumerate() {
            if events[..i].contains(&event) {
                return Err(EvbusError::invalid_parameter(
                    "events",
                    "Duplicate member event in rule",
                ));
            }
        }

        Ok(Self {
            kind,
            events: events.to_vec().into_boxed_slice(),
            timeouts_ms,
            trigger_mask: AtomicU32::new(0),
            query_cache: AtomicU32::new(0),
        })
    }

    /// Trigger kind
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Member event keys, in mask-bit order
    pub fn events(&self) -> &[u16] {
        &self.events
    }

    /// Position of `event_key` in the member array, if it is a member
    pub(crate) fn position_of(&self, event_key: u16) -> Option<usize> {
        self.events.iter().position(|&e| e == event_key)
    }

    /// Configured timeout for `event_key`, if the rule carries one
    pub fn timeout_for(&self, event_key: u16) -> Option<u32> {
        let pos = self.position_of(event_key)?;
        self.timeouts_ms.as_ref().map(|t| t[pos])
    }

    /// Mask with one bit per member event
    pub fn full_mask(&self) -> u32 {
        if self.events.len() == MAX_RULE_EVENTS {
            u32::MAX
        } else {
            (1u32 << self.events.len()) - 1
        }
    }

    /// Current accumulation state
    pub fn trigger_mask(&self) -> u32 {
        self.trigger_mask.load(Ordering::Acquire)
    }

    pub(crate) fn mask_fetch_or(&self, bits: u32) -> u32 {
        self.trigger_mask.fetch_or(bits, Ordering::AcqRel)
    }

    pub(crate) fn mask_fetch_and(&self, bits: u32) -> u32 {
        self.trigger_mask.fetch_and(bits, Ordering::AcqRel)
    }

    /// Reset the accumulation mask to the empty state
    pub fn reset_mask(&self) {
        self.trigger_mask.store(0, Ordering::Release);
    }

    pub(crate) fn cache_lookup(&self, event_key: u16) -> Option<bool> {
        const VALID: u32 = 1 << 17;
        const HIT: u32 = 1 << 16;
        let cached = self.query_cache.load(Ordering::Relaxed);
        if cached & VALID != 0 && (cached & 0xFFFF) as u16 == event_key {
            Some(cached & HIT != 0)
        } else {
            None
        }
    }

    pub(crate) fn cache_store(&self, event_key: u16, hit: bool) {
        const VALID: u32 = 1 << 17;
        const HIT: u32 = 1 << 16;
        let mut packed = VALID | event_key as u32;
        if hit {
            packed |= HIT;
        }
        self.query_cache.store(packed, Ordering::Relaxed);
    }
}
