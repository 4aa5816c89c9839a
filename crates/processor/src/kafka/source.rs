//! Kafka source consumer
//!
//! Wraps an rdkafka [`StreamConsumer`] behind [`MessageSource`] and
//! [`TopicMetadata`]. Every consume call is bounded by a timeout so the loop
//! sees the shutdown flag at least once per timeout period.

use acm_config::{PipelineConfig, StartOffset};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::{BorrowedMessage, Timestamp};
use rdkafka::{ClientContext, Message, Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, Level};

use super::{classify, Delivery, InboundMessage, MessageSource, MessageTimestamp, TopicMetadata};
use crate::error::{ProcessorError, Result};

/// Timeout for the metadata dump logged after subscribing
const METADATA_DUMP_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer context that logs rebalances and commit failures
struct SourceConsumerContext;

impl ClientContext for SourceConsumerContext {}

impl ConsumerContext for SourceConsumerContext {
    fn pre_rebalance(&self, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Revoke(tpl) => info!("Partition revocation: {:?}", tpl),
            Rebalance::Assign(tpl) => info!("Partition assignment: {:?}", tpl),
            Rebalance::Error(err) => error!("Rebalance error: {}", err),
        }
    }

    fn post_rebalance(&self, rebalance: &Rebalance) {
        if let Rebalance::Assign(tpl) = rebalance {
            let partitions: Vec<i32> = tpl.elements().iter().map(|e| e.partition()).collect();
            info!(partitions = ?partitions, "Successfully assigned partitions");
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        if let Err(err) = result {
            error!(error = %err, "Commit callback error");
        }
    }
}

/// Kafka consumer for the input topic
pub struct KafkaSource {
    consumer: Arc<StreamConsumer<SourceConsumerContext>>,
}

impl KafkaSource {
    /// Create the consumer; nothing is subscribed yet
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let consumer: StreamConsumer<SourceConsumerContext> = client_config(config)
            .create_with_context(SourceConsumerContext)
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;

        info!(brokers = %config.brokers, group_id = %config.group_id, "Created Kafka consumer");

        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }

    async fn log_cluster_metadata(&self) {
        let consumer = Arc::clone(&self.consumer);

        let fetched = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(None, METADATA_DUMP_TIMEOUT)
                .map(|metadata| ClusterSummary {
                    origin_broker: metadata.orig_broker_name().to_string(),
                    brokers: metadata
                        .brokers()
                        .iter()
                        .map(|b| (b.id(), b.host().to_string(), b.port()))
                        .collect(),
                    topics: metadata
                        .topics()
                        .iter()
                        .map(|t| (t.name().to_string(), t.partitions().len()))
                        .collect(),
                })
        })
        .await;

        let summary = match fetched {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                debug!(error = %e, "Failed to fetch cluster metadata");
                return;
            }
            Err(e) => {
                debug!(error = %e, "Cluster metadata task failed");
                return;
            }
        };

        debug!(
            origin_broker = %summary.origin_broker,
            brokers = summary.brokers.len(),
            topics = summary.topics.len(),
            "Cluster metadata"
        );
        for (id, host, port) in &summary.brokers {
            debug!(id, host = %host, port, "Broker");
        }
        for (topic, partitions) in &summary.topics {
            debug!(topic = %topic, partitions, "Topic");
        }
    }
}

/// Owned copy of the metadata fields logged at debug level
struct ClusterSummary {
    origin_broker: String,
    brokers: Vec<(i32, String, i32)>,
    topics: Vec<(String, usize)>,
}

/// Consumer client configuration
///
/// Pass-through properties are applied after the built-in ones; the start
/// offset policy and debug contexts are applied last.
fn client_config(config: &PipelineConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();

    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("enable.partition.eof", "true");

    for (key, value) in &config.kafka {
        client_config.set(key, value);
    }

    if let Some(reset) = config.offset.and_then(|offset| offset.auto_offset_reset()) {
        client_config.set("auto.offset.reset", reset);
    }

    if let Some(debug) = &config.debug {
        client_config.set("debug", debug);
    }

    client_config
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    let timestamp = match message.timestamp() {
        Timestamp::NotAvailable => None,
        Timestamp::CreateTime(ms) => Some(MessageTimestamp::CreateTime(ms)),
        Timestamp::LogAppendTime(ms) => Some(MessageTimestamp::LogAppendTime(ms)),
    };

    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        payload: message.payload().map(<[u8]>::to_vec),
        key: message.key().map(<[u8]>::to_vec),
        timestamp,
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn subscribe(
        &self,
        topics: &[String],
        offset: Option<StartOffset>,
        partition: Option<i32>,
    ) -> Result<()> {
        if tracing::enabled!(Level::DEBUG) {
            self.log_cluster_metadata().await;
        }

        let subscription_error = |e: rdkafka::error::KafkaError| ProcessorError::Subscription {
            topics: topics.to_vec(),
            reason: e.to_string(),
        };

        if let Some(StartOffset::Offset(position)) = offset {
            let partition = partition.unwrap_or(0);
            let mut tpl = TopicPartitionList::new();
            for topic in topics {
                tpl.add_partition_offset(topic, partition, Offset::Offset(position))
                    .map_err(subscription_error)?;
            }
            self.consumer.assign(&tpl).map_err(subscription_error)?;

            info!(topics = ?topics, partition, offset = position, "Assigned topic partition");
        } else {
            let topic_refs: Vec<&str> = topics.iter().map(|s| s.as_str()).collect();
            self.consumer
                .subscribe(&topic_refs)
                .map_err(subscription_error)?;

            match offset {
                Some(offset) => info!(topics = ?topics, offset = %offset, "Subscribed to topics"),
                None => info!(topics = ?topics, "Subscribed to topics at committed offsets"),
            }
        }

        Ok(())
    }

    async fn consume(&mut self, timeout: Duration) -> Delivery {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => Delivery::Message(to_inbound(&message)),
            Ok(Err(e)) => classify(&e),
            Err(_) => Delivery::Timeout,
        }
    }

    fn close(&self) {
        self.consumer.unsubscribe();
        info!("Kafka consumer closed");
    }
}

#[async_trait]
impl TopicMetadata for KafkaSource {
    async fn topic_names(&self, timeout: Duration) -> Result<Vec<String>> {
        let consumer = Arc::clone(&self.consumer);

        tokio::task::spawn_blocking(move || {
            consumer.fetch_metadata(None, timeout).map(|metadata| {
                metadata
                    .topics()
                    .iter()
                    .map(|topic| topic.name().to_string())
                    .collect::<Vec<String>>()
            })
        })
        .await
        .map_err(|e| ProcessorError::Kafka {
            source: Box::new(e),
        })?
        .map_err(|e| ProcessorError::Kafka {
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig {
            brokers: "broker-1:9092".to_string(),
            consumer_topics: vec!["in".to_string()],
            producer_topic: "out".to_string(),
            debug: Some("consumer,cgrp".to_string()),
            ..Default::default()
        };
        config
            .kafka
            .insert("auto.offset.reset".to_string(), "latest".to_string());
        config
            .kafka
            .insert("session.timeout.ms".to_string(), "6000".to_string());
        config
    }

    #[test]
    fn test_client_config() {
        let built = client_config(&config());

        assert_eq!(built.get("bootstrap.servers"), Some("broker-1:9092"));
        assert_eq!(built.get("group.id"), Some("asn1-codec"));
        assert_eq!(built.get("enable.partition.eof"), Some("true"));
        assert_eq!(built.get("session.timeout.ms"), Some("6000"));
        assert_eq!(built.get("debug"), Some("consumer,cgrp"));
    }

    #[test]
    fn test_explicit_offset_policy_overrides_file_reset() {
        let mut beginning = config();
        beginning.offset = Some(StartOffset::Beginning);
        let built = client_config(&beginning);
        assert_eq!(built.get("auto.offset.reset"), Some("earliest"));

        let mut end = config();
        end.offset = Some(StartOffset::End);
        assert_eq!(client_config(&end).get("auto.offset.reset"), Some("latest"));
    }

    #[test]
    fn test_file_offset_reset_kept_without_offset_policy() {
        let mut unset = config();
        unset.kafka.insert("auto.offset.reset".to_string(), "earliest".to_string());
        let built = client_config(&unset);
        assert_eq!(built.get("auto.offset.reset"), Some("earliest"));

        let mut stored = config();
        stored.offset = Some(StartOffset::Stored);
        assert_eq!(client_config(&stored).get("auto.offset.reset"), Some("latest"));
    }

    #[tokio::test]
    async fn test_create_consumer_without_broker() {
        // Client creation does not contact the broker
        let source = KafkaSource::new(&config());
        assert!(source.is_ok());
    }
}
