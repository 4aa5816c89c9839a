//! Kafka sink producer
//!
//! Produce calls only enqueue: the payload is copied into the client's
//! queue and the delivery report is not awaited.

use acm_config::PipelineConfig;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::info;

use super::{MessageSink, ProduceError};
use crate::error::{ProcessorError, Result};

/// Kafka producer for the output topic
pub struct KafkaSink {
    producer: FutureProducer,
}

impl KafkaSink {
    /// Create the producer
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let producer: FutureProducer =
            client_config(config)
                .create()
                .map_err(|e| ProcessorError::Configuration {
                    source: Box::new(e),
                })?;

        info!(brokers = %config.brokers, topic = %config.producer_topic, "Created Kafka producer");

        Ok(Self { producer })
    }
}

fn client_config(config: &PipelineConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();

    client_config.set("bootstrap.servers", &config.brokers);

    for (key, value) in &config.kafka {
        client_config.set(key, value);
    }

    if let Some(debug) = &config.debug {
        client_config.set("debug", debug);
    }

    client_config
}

impl MessageSink for KafkaSink {
    fn produce(
        &self,
        topic: &str,
        partition: Option<i32>,
        payload: &[u8],
    ) -> std::result::Result<(), ProduceError> {
        let mut record = FutureRecord::<(), [u8]>::to(topic).payload(payload);
        if let Some(partition) = partition {
            record = record.partition(partition);
        }

        match self.producer.send_result(record) {
            // Delivery is not awaited
            Ok(_delivery) => Ok(()),
            Err((e, _record)) => Err(ProduceError {
                topic: topic.to_string(),
                bytes: payload.len(),
                reason: e.to_string(),
            }),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        info!("Flushing pending messages...");
        self.producer
            .flush(timeout)
            .map_err(|e| ProcessorError::Kafka {
                source: Box::new(e),
            })?;
        info!("Flush completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_config_skips_consumer_settings() {
        let mut config = PipelineConfig {
            brokers: "broker-1:9092,broker-2:9092".to_string(),
            ..Default::default()
        };
        config
            .kafka
            .insert("compression.type".to_string(), "lz4".to_string());

        let client_config = client_config(&config);
        assert_eq!(
            client_config.get("bootstrap.servers"),
            Some("broker-1:9092,broker-2:9092")
        );
        assert_eq!(client_config.get("compression.type"), Some("lz4"));
        assert_eq!(client_config.get("group.id"), None);
        assert_eq!(client_config.get("debug"), None);
    }
}
