//! Bus configuration

use serde::{Deserialize, Serialize};

use crate::{
    config as defaults,
    error::{EvbusError, Result},
};

/// Fixed capacities and behavior toggles for one bus instance
///
/// All capacities are fixed at construction; nothing resizes at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Maximum number of topic slots
    pub max_topics: usize,
    /// Maximum subscribers per topic
    pub max_subscribers_per_topic: usize,
    /// ISR queue capacity (must be a power of two)
    pub isr_queue_capacity: usize,
    /// Default freshness window for AND-rule members without a per-event
    /// timeout, in milliseconds
    pub default_event_timeout_ms: u32,
    /// Wait budget for the bus and store locks, in milliseconds
    pub lock_timeout_ms: u64,
    /// Poll period of the topic server, in milliseconds
    pub server_period_ms: u64,
    /// Route table capacity of the router
    pub max_routes: usize,
    /// Whether throughput counters are maintained
    pub enable_stats: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_topics: defaults::DEFAULT_MAX_TOPICS,
            max_subscribers_per_topic: defaults::DEFAULT_MAX_SUBSCRIBERS,
            isr_queue_capacity: defaults::DEFAULT_ISR_QUEUE_CAPACITY,
            default_event_timeout_ms: defaults::DEFAULT_EVENT_TIMEOUT_MS,
            lock_timeout_ms: defaults::DEFAULT_LOCK_TIMEOUT_MS,
            server_period_ms: defaults::DEFAULT_SERVER_PERIOD_MS,
            max_routes: defaults::DEFAULT_MAX_ROUTES,
            enable_stats: true,
        }
    }
}

impl BusConfig {
    /// Validate capacity constraints; called once at bus construction
    pub fn validate(&self) -> Result<()> {
        if self.max_topics == 0 {
            return Err(EvbusError::invalid_parameter(
                "max_topics",
                "At least one topic slot is required",
            ));
        }
        if self.max_subscribers_per_topic == 0 {
            return Err(EvbusError::invalid_parameter(
                "max_subscribers_per_topic",
                "At least one subscriber slot is required",
            ));
        }
        if self.isr_queue_capacity == 0 || !self.isr_queue_capacity.is_power_of_two() {
            return Err(EvbusError::invalid_parameter(
                "isr_queue_capacity",
                "ISR queue capacity must be a power of 2 and greater than 0",
            ));
        }
        Ok(())
    }

    /// The configured lock wait budget as a duration
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BusConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_capacities() {
        let mut config = BusConfig::default();
        config.isr_queue_capacity = 12;
        assert!(config.validate().is_err());

        let mut config = BusConfig::default();
        config.max_topics = 0;
        assert!(config.validate().is_err());
    }
}
