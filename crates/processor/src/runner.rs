//! Lifecycle of one transcoder run
//!
//! Producer, then consumer, then the topic gate, then subscription, then the
//! loop. Teardown leaves the consumer group and flushes the producer.

use acm_config::PipelineConfig;
use std::time::Duration;
use tracing::{error, info};

use crate::codec::Codec;
use crate::error::Result;
use crate::gate::TopicGate;
use crate::kafka::{KafkaSink, KafkaSource, MessageSink, MessageSource, TopicMetadata};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::shutdown::ShutdownSignal;
use crate::stats::RunCounters;

/// Grace period for delivering queued messages at teardown
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Gate, subscribe and run the loop over already constructed clients
pub async fn drive<S, K, C>(
    source: &mut S,
    sink: &K,
    codec: C,
    config: &PipelineConfig,
    shutdown: &ShutdownSignal,
) -> Result<RunCounters>
where
    S: MessageSource + TopicMetadata,
    K: MessageSink,
    C: Codec,
{
    TopicGate::new(&*source, shutdown.clone())
        .wait_for(&config.consumer_topics)
        .await?;

    source
        .subscribe(&config.consumer_topics, config.offset, config.partition)
        .await?;

    let settings = PipelineSettings::from_config(config);
    let counters = Pipeline::new(source, sink, codec, settings, shutdown.clone())
        .run()
        .await;

    Ok(counters)
}

/// Drive already constructed clients, then tear them down
///
/// The consumer is closed before the producer is flushed, whether or not the
/// run succeeded. A flush failure is logged and does not change the result.
pub async fn run_with_clients<S, K, C>(
    source: &mut S,
    sink: &K,
    codec: C,
    config: &PipelineConfig,
    shutdown: &ShutdownSignal,
) -> Result<RunCounters>
where
    S: MessageSource + TopicMetadata,
    K: MessageSink,
    C: Codec,
{
    let result = drive(source, sink, codec, config, shutdown).await;

    source.close();
    if let Err(e) = sink.flush(FLUSH_TIMEOUT) {
        error!(error = %e, "Failed to flush producer");
    }

    if let Ok(counters) = &result {
        counters.log_summary();
    }
    info!("Transcoder stopped");

    result
}

/// Run the transcoder against the configured cluster until shutdown
///
/// The configuration is validated before any client is created.
pub async fn run<C: Codec>(
    config: &PipelineConfig,
    codec: C,
    shutdown: &ShutdownSignal,
) -> Result<RunCounters> {
    config.validate()?;

    let sink = KafkaSink::new(config)?;
    let mut source = KafkaSource::new(config)?;

    run_with_clients(&mut source, &sink, codec, config, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OctetStringCodec;
    use crate::error::ProcessorError;
    use crate::kafka::Delivery;
    use crate::testing::{message, CallLog, RecordingSink, ScriptedSource, SubscribeCall};
    use acm_config::StartOffset;

    fn config() -> PipelineConfig {
        PipelineConfig {
            consumer_topics: vec!["in".to_string()],
            producer_topic: "out".to_string(),
            partition: Some(1),
            offset: Some(StartOffset::Offset(10)),
            exit_on_eof: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_drive_subscribes_after_gate() {
        let shutdown = ShutdownSignal::new();
        let mut source = ScriptedSource::new(shutdown.clone())
            .with_metadata(Ok(vec!["in".to_string()]))
            .with_delivery(Delivery::Message(message("in", 10, &[0x01, 0xFF])))
            .with_delivery(Delivery::PartitionEof { partition: 1 });
        let sink = RecordingSink::new();

        let counters = drive(
            &mut source,
            &sink,
            OctetStringCodec::default(),
            &config(),
            &shutdown,
        )
        .await
        .unwrap();

        assert_eq!(
            source.subscriptions(),
            vec![SubscribeCall {
                topics: vec!["in".to_string()],
                offset: Some(StartOffset::Offset(10)),
                partition: Some(1),
            }]
        );
        assert_eq!(counters.sent.count, 1);
        assert_eq!(sink.produced()[0].partition, Some(1));
    }

    #[tokio::test]
    async fn test_drive_does_not_subscribe_when_cancelled() {
        let shutdown = ShutdownSignal::new();
        shutdown.request_shutdown();
        let mut source = ScriptedSource::new(shutdown.clone());
        let sink = RecordingSink::new();

        let result = drive(
            &mut source,
            &sink,
            OctetStringCodec::default(),
            &config(),
            &shutdown,
        )
        .await;

        assert!(matches!(result, Err(ProcessorError::Cancelled { .. })));
        assert!(source.subscriptions().is_empty());
        assert_eq!(source.consume_calls(), 0);
    }

    #[tokio::test]
    async fn test_drive_aborts_on_subscription_failure() {
        let shutdown = ShutdownSignal::new();
        let mut source = ScriptedSource::new(shutdown.clone())
            .with_metadata(Ok(vec!["in".to_string()]))
            .fail_subscribe("Local: Invalid argument");
        let sink = RecordingSink::new();

        let result = drive(
            &mut source,
            &sink,
            OctetStringCodec::default(),
            &config(),
            &shutdown,
        )
        .await;

        assert!(matches!(result, Err(ProcessorError::Subscription { .. })));
        assert_eq!(source.consume_calls(), 0);
    }

    #[tokio::test]
    async fn test_teardown_closes_consumer_before_flushing() {
        let shutdown = ShutdownSignal::new();
        let log = CallLog::new();
        let mut source = ScriptedSource::new(shutdown.clone())
            .with_call_log(log.clone())
            .with_metadata(Ok(vec!["in".to_string()]))
            .with_delivery(Delivery::Message(message("in", 10, &[0x01, 0xFF])))
            .with_delivery(Delivery::PartitionEof { partition: 1 });
        let sink = RecordingSink::new().with_call_log(log.clone());

        let counters = run_with_clients(
            &mut source,
            &sink,
            OctetStringCodec::default(),
            &config(),
            &shutdown,
        )
        .await
        .unwrap();

        assert_eq!(counters.sent.count, 1);
        assert_eq!(log.calls(), vec!["subscribe", "close", "flush"]);
        assert!(source.is_closed());
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test]
    async fn test_teardown_runs_after_cancelled_gate() {
        let shutdown = ShutdownSignal::new();
        shutdown.request_shutdown();
        let log = CallLog::new();
        let mut source = ScriptedSource::new(shutdown.clone()).with_call_log(log.clone());
        let sink = RecordingSink::new().with_call_log(log.clone());

        let result = run_with_clients(
            &mut source,
            &sink,
            OctetStringCodec::default(),
            &config(),
            &shutdown,
        )
        .await;

        assert!(matches!(result, Err(ProcessorError::Cancelled { .. })));
        assert_eq!(log.calls(), vec!["close", "flush"]);
        assert!(source.is_closed());
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config_before_connecting() {
        let shutdown = ShutdownSignal::new();
        let mut config = config();
        config.producer_topic.clear();

        let result = run(&config, OctetStringCodec::default(), &shutdown).await;
        assert!(matches!(result, Err(ProcessorError::Configuration { .. })));
    }
}
