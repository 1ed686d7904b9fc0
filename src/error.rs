//! Error types and handling for evbus

/// Result type alias for evbus operations
pub type Result<T> = std::result::Result<T, EvbusError>;

/// Comprehensive error types for the evbus event bus
#[derive(Debug, thiserror::Error)]
pub enum EvbusError {
    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Memory allocation failures
    #[error("Memory error: {message}")]
    Memory { message: String },

    /// A fixed-capacity structure has no free slot left
    #[error("Capacity exhausted: {resource} (capacity {capacity})")]
    CapacityExhausted { resource: String, capacity: usize },

    /// A bounded lock wait elapsed before the lock was acquired
    #[error("Lock timeout: {resource}")]
    LockTimeout { resource: String },

    /// Event key not present in the object store
    #[error("Key not found: {key}")]
    KeyNotFound { key: u16 },

    /// Topic id not present on the bus
    #[error("Topic not found: {topic_id}")]
    TopicNotFound { topic_id: u16 },

    /// Subscription id not registered on the topic
    #[error("Subscription not found: topic {topic_id}, subscription {id}")]
    SubscriptionNotFound { topic_id: u16, id: u64 },

    /// No matching route entry for the topic
    #[error("Route not found: topic {topic_id}")]
    RouteNotFound { topic_id: u16 },

    /// A VFB route was hit but no sink is installed on the router
    #[error("No VFB sink installed: topic {topic_id}")]
    SinkUnavailable { topic_id: u16 },

    /// Buffer is full (ring buffers, ISR queue)
    #[error("Buffer full: {buffer_type}")]
    BufferFull { buffer_type: String },

    /// Buffer is empty
    #[error("Buffer empty: {buffer_type}")]
    BufferEmpty { buffer_type: String },

    /// `release` called more times than `retain` on an entry
    #[error("Reference count underflow: key {key}")]
    RefCountUnderflow { key: u16 },

    /// A downstream sink or subscriber callback reported failure
    #[error("Delivery error: {message}")]
    Delivery { message: String },
}

impl EvbusError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    /// Create a capacity exhausted error
    pub fn capacity_exhausted(resource: impl Into<String>, capacity: usize) -> Self {
        Self::CapacityExhausted {
            resource: resource.into(),
            capacity,
        }
    }

    /// Create a lock timeout error
    pub fn lock_timeout(resource: impl Into<String>) -> Self {
        Self::LockTimeout {
            resource: resource.into(),
        }
    }

    /// Create a buffer full error
    pub fn buffer_full(buffer_type: impl Into<String>) -> Self {
        Self::BufferFull {
            buffer_type: buffer_type.into(),
        }
    }

    /// Create a buffer empty error
    pub fn buffer_empty(buffer_type: impl Into<String>) -> Self {
        Self::BufferEmpty {
            buffer_type: buffer_type.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}
