//! Trigger rules and the matching engine
//!
//! A rule is a topic's firing condition over a set of event keys: OR fires
//! on any member event, AND accumulates member arrivals in a bitmask and
//! fires once the mask is full and every member is still fresh, MANUAL only
//! fires on explicit request. Freshness is judged against object store
//! timestamps under a single monotonic clock.

pub mod engine;
pub mod rule;

pub use rule::{Rule, RuleKind, MAX_RULE_EVENTS, NEVER_EXPIRE_MS};
