//! Classification of consumer errors and produce failures

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use thiserror::Error;

use super::Delivery;

/// A message that could not be handed to the producer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to produce {bytes} bytes to {topic}: {reason}")]
pub struct ProduceError {
    pub topic: String,
    pub bytes: usize,
    pub reason: String,
}

/// Map a consumer error onto the delivery taxonomy
pub fn classify(err: &KafkaError) -> Delivery {
    match err {
        KafkaError::PartitionEOF(partition) => Delivery::PartitionEof {
            partition: *partition,
        },
        KafkaError::MessageConsumption(code) => match code {
            RDKafkaErrorCode::UnknownTopic | RDKafkaErrorCode::UnknownTopicOrPartition => {
                Delivery::UnknownTopic(err.to_string())
            }
            RDKafkaErrorCode::UnknownPartition => Delivery::UnknownPartition(err.to_string()),
            RDKafkaErrorCode::OperationTimedOut => Delivery::Timeout,
            RDKafkaErrorCode::PartitionEOF => Delivery::PartitionEof { partition: -1 },
            _ => Delivery::Error(err.to_string()),
        },
        _ => Delivery::Error(err.to_string()),
    }
}
