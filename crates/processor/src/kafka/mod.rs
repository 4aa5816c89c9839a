//! Broker-facing types and the traits the pipeline is written against
//!
//! [`KafkaSource`] and [`KafkaSink`] implement the traits over rdkafka. The
//! gate and the consume loop only see the traits, so they run unchanged
//! against the scripted implementations in [`crate::testing`].

pub mod error;
pub mod sink;
pub mod source;

use acm_config::StartOffset;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub use error::{classify, ProduceError};
pub use sink::KafkaSink;
pub use source::KafkaSource;

/// Broker timestamp attached to a consumed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTimestamp {
    /// Set by the producer
    CreateTime(i64),
    /// Set by the broker when the message was appended
    LogAppendTime(i64),
}

impl MessageTimestamp {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTime(_) => "create time",
            Self::LogAppendTime(_) => "log append time",
        }
    }

    /// Milliseconds since the Unix epoch
    pub fn millis(&self) -> i64 {
        match self {
            Self::CreateTime(ms) | Self::LogAppendTime(ms) => *ms,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.millis())
    }
}

impl fmt::Display for MessageTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{} {}", self.kind(), dt.to_rfc3339()),
            None => write!(f, "{} {}", self.kind(), self.millis()),
        }
    }
}

/// A consumed message, detached from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
    pub timestamp: Option<MessageTimestamp>,
}

impl InboundMessage {
    /// Payload length in bytes; zero when there is no payload
    pub fn len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes; empty when there is no payload
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }
}

/// Outcome of one consume call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(InboundMessage),
    /// Nothing arrived within the timeout
    Timeout,
    /// The consumer reached the current end of a partition
    PartitionEof { partition: i32 },
    UnknownTopic(String),
    UnknownPartition(String),
    /// Any other consumer error
    Error(String),
}

/// Consuming side of the broker connection
#[async_trait]
pub trait MessageSource: Send {
    /// Start reading `topics` from `offset`
    ///
    /// An explicit offset is applied to `partition`, or partition 0 when no
    /// partition is configured. `None` resumes from the group's committed
    /// offsets.
    async fn subscribe(
        &self,
        topics: &[String],
        offset: Option<StartOffset>,
        partition: Option<i32>,
    ) -> Result<()>;

    /// Wait up to `timeout` for the next delivery
    async fn consume(&mut self, timeout: Duration) -> Delivery;

    /// Leave the consumer group
    fn close(&self);
}

/// Cluster metadata queries
#[async_trait]
pub trait TopicMetadata: Send + Sync {
    /// Names of every topic known to the cluster
    async fn topic_names(&self, timeout: Duration) -> Result<Vec<String>>;
}

/// Producing side of the broker connection
pub trait MessageSink {
    /// Enqueue a copy of `payload` for `topic`
    ///
    /// `None` leaves the partition to the configured partitioner.
    fn produce(
        &self,
        topic: &str,
        partition: Option<i32>,
        payload: &[u8],
    ) -> std::result::Result<(), ProduceError>;

    /// Wait up to `timeout` for queued messages to be delivered
    fn flush(&self, timeout: Duration) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_length_without_payload() {
        let message = InboundMessage {
            topic: "in".to_string(),
            partition: 0,
            offset: 7,
            payload: None,
            key: None,
            timestamp: None,
        };

        assert_eq!(message.len(), 0);
        assert!(message.is_empty());
        assert!(message.payload().is_empty());
    }

    #[test]
    fn test_timestamp_kind_and_display() {
        let ts = MessageTimestamp::LogAppendTime(1_500_000_000_000);
        assert_eq!(ts.kind(), "log append time");
        assert_eq!(ts.millis(), 1_500_000_000_000);
        assert!(ts.to_string().starts_with("log append time 2017-07-14"));

        assert_eq!(MessageTimestamp::CreateTime(0).kind(), "create time");
    }
}
