//! Consume-decode-encode-produce loop

use acm_config::PipelineConfig;
use std::time::Duration;
use tracing::{debug, error, info, trace};

use crate::codec::{BridgeError, Codec, DecodeState, Transcoder};
use crate::kafka::{Delivery, InboundMessage, MessageSink, MessageSource};
use crate::shutdown::ShutdownSignal;
use crate::stats::RunCounters;

/// The part of [`PipelineConfig`] the loop reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub input_topic: String,
    pub output_topic: String,
    pub partition: Option<i32>,
    pub consume_timeout: Duration,
    pub exit_on_eof: bool,
    pub partition_count: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            input_topic: config.consumer_topics.first().cloned().unwrap_or_default(),
            output_topic: config.producer_topic.clone(),
            partition: config.partition,
            consume_timeout: config.consumer_timeout(),
            exit_on_eof: config.exit_on_eof,
            partition_count: config.partition_count,
        }
    }
}

/// One run of the transcoding loop
///
/// Owns the decode state, the outbound buffer and the counters; borrows the
/// broker connections for the duration of the run.
pub struct Pipeline<'a, S: ?Sized, K: ?Sized, C> {
    source: &'a mut S,
    sink: &'a K,
    transcoder: Transcoder<C>,
    settings: PipelineSettings,
    shutdown: ShutdownSignal,
    state: DecodeState,
    buffer: Vec<u8>,
    counters: RunCounters,
}

impl<'a, S, K, C> Pipeline<'a, S, K, C>
where
    S: MessageSource + ?Sized,
    K: MessageSink + ?Sized,
    C: Codec,
{
    pub fn new(
        source: &'a mut S,
        sink: &'a K,
        codec: C,
        settings: PipelineSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            sink,
            transcoder: Transcoder::new(codec),
            settings,
            shutdown,
            state: DecodeState::new(),
            buffer: Vec::new(),
            counters: RunCounters::new(),
        }
    }

    /// Run until shutdown is requested and return the counters
    pub async fn run(mut self) -> RunCounters {
        info!(
            input = %self.settings.input_topic,
            output = %self.settings.output_topic,
            "Starting transcoding loop"
        );

        while self.shutdown.is_running() {
            self.step().await;
        }

        info!("Transcoding loop stopped");
        self.counters
    }

    /// One consume and its handling
    pub async fn step(&mut self) {
        self.buffer.clear();

        match self.source.consume(self.settings.consume_timeout).await {
            Delivery::Timeout => {
                debug!(
                    timeout_ms = self.settings.consume_timeout.as_millis() as u64,
                    "Waiting for more messages"
                );
            }
            Delivery::Message(message) => self.handle_message(&message),
            Delivery::PartitionEof { partition } => self.handle_eof(partition),
            Delivery::UnknownTopic(reason) => {
                error!(reason = %reason, topic = %self.settings.input_topic, "Unknown topic");
                self.shutdown.request_shutdown();
            }
            Delivery::UnknownPartition(reason) => {
                error!(reason = %reason, topic = %self.settings.input_topic, "Unknown partition");
                self.shutdown.request_shutdown();
            }
            Delivery::Error(reason) => {
                error!(reason = %reason, "Consumer error");
                self.shutdown.request_shutdown();
            }
        }
    }

    fn handle_message(&mut self, message: &InboundMessage) {
        self.counters.record_received(message.len());

        trace!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            bytes = message.len(),
            timestamp = ?message.timestamp.map(|ts| ts.to_string()),
            key = ?message.key.as_deref().map(String::from_utf8_lossy),
            "Read message"
        );

        if message.is_empty() {
            return;
        }

        match self
            .transcoder
            .transcode(message.payload(), &mut self.state, &mut self.buffer)
        {
            Ok(encoded) => {
                match self.sink.produce(
                    &self.settings.output_topic,
                    self.settings.partition,
                    &self.buffer,
                ) {
                    Ok(()) => {
                        self.counters.record_sent(encoded);
                        debug!(
                            topic = %self.settings.output_topic,
                            bytes = encoded,
                            "Produced message"
                        );
                    }
                    Err(e) => error!(error = %e, "Failed to produce message"),
                }
            }
            Err(BridgeError::DecodeFailed { len }) => {
                error!(
                    topic = %message.topic,
                    offset = message.offset,
                    bytes = len,
                    first_block = self.state.is_first_block(),
                    "Failed to decode message"
                );
            }
            Err(BridgeError::EncodeFailed { len, reason }) => {
                error!(
                    reason = %reason,
                    topic = %message.topic,
                    offset = message.offset,
                    bytes = len,
                    "Failed to encode message as XER"
                );
            }
        }
    }

    fn handle_eof(&mut self, partition: i32) {
        info!(
            topic = %self.settings.input_topic,
            partition,
            "Reached end of partition"
        );

        if !self.settings.exit_on_eof {
            return;
        }

        if self.counters.record_eof() >= self.settings.partition_count {
            info!(
                partitions = self.settings.partition_count,
                "All partitions reached their end; stopping"
            );
            self.shutdown.request_shutdown();
        }
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn decode_state(&self) -> DecodeState {
        self.state
    }
}
