//! Topic availability gate
//!
//! Subscribing to a topic that does not exist yet ends the consumer with an
//! unknown-topic error, so startup waits here until cluster metadata lists
//! every consumed topic.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{ProcessorError, Result};
use crate::kafka::TopicMetadata;
use crate::shutdown::ShutdownSignal;

/// Timeout for one metadata query
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between metadata queries while a topic is missing
pub const TOPIC_RETRY_INTERVAL: Duration = Duration::from_millis(1500);

/// Waits for topics to appear in cluster metadata
pub struct TopicGate<'a, M: ?Sized> {
    metadata: &'a M,
    shutdown: ShutdownSignal,
}

impl<'a, M> TopicGate<'a, M>
where
    M: TopicMetadata + ?Sized,
{
    pub fn new(metadata: &'a M, shutdown: ShutdownSignal) -> Self {
        Self { metadata, shutdown }
    }

    /// Wait until every topic in `topics` is available, in order
    ///
    /// Returns [`ProcessorError::Cancelled`] with the topics still missing
    /// if shutdown is requested first.
    pub async fn wait_for(&self, topics: &[String]) -> Result<()> {
        for (index, topic) in topics.iter().enumerate() {
            loop {
                if !self.shutdown.is_running() {
                    return Err(ProcessorError::Cancelled {
                        pending: topics[index..].to_vec(),
                    });
                }

                match self.metadata.topic_names(METADATA_TIMEOUT).await {
                    Ok(names) if names.iter().any(|name| name == topic) => {
                        info!(topic = %topic, "Topic is available");
                        break;
                    }
                    Ok(_) => {
                        warn!(
                            topic = %topic,
                            retry_ms = TOPIC_RETRY_INTERVAL.as_millis() as u64,
                            "Topic not available yet; waiting"
                        );
                    }
                    Err(e) => {
                        error!(topic = %topic, error = %e, "Failed to fetch topic metadata");
                    }
                }

                tokio::time::sleep(TOPIC_RETRY_INTERVAL).await;
            }
        }

        Ok(())
    }
}
