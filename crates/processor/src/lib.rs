//! Transcoding pipeline for the ASN.1 codec module
//!
//! Consumes UPER-encoded messages from one Kafka topic, re-encodes them as
//! XER through a [`Codec`] and publishes the result to another topic.

pub mod codec;
pub mod error;
pub mod gate;
pub mod kafka;
pub mod pipeline;
pub mod runner;
pub mod shutdown;
pub mod stats;

/// Scripted broker doubles for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use codec::{BridgeError, Codec, CodecError, DecodeState, OctetStringCodec, Transcoder};
pub use error::{ProcessorError, Result as ProcessorResult};
pub use gate::TopicGate;
pub use kafka::{
    Delivery, InboundMessage, KafkaSink, KafkaSource, MessageSink, MessageSource,
    MessageTimestamp, ProduceError, TopicMetadata,
};
pub use pipeline::{Pipeline, PipelineSettings};
pub use shutdown::{spawn_signal_listener, ShutdownSignal};
pub use stats::{RunCounters, Tally};
