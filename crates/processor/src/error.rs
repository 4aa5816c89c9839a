//! Error types for the transcoding pipeline
//!
//! Per-message failures (decode, encode, produce) are handled inside the
//! loop and never surface here. `ProcessorError` covers what aborts a run:
//! client construction, subscription, cancellation before the loop starts.

use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Configuration errors, including invalid client properties
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Kafka client errors
    #[error("kafka error: {source}")]
    Kafka {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Subscribing or assigning the consumed topics failed
    #[error("failed to subscribe to {topics:?}: {reason}")]
    Subscription { topics: Vec<String>, reason: String },

    /// Shutdown was requested before all required topics became available
    #[error("shutdown requested while waiting for topics {pending:?}")]
    Cancelled { pending: Vec<String> },
}

impl From<acm_config::ConfigError> for ProcessorError {
    fn from(err: acm_config::ConfigError) -> Self {
        ProcessorError::Configuration {
            source: Box::new(err),
        }
    }
}

/// Result type for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;
