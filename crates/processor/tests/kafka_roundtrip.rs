//! Integration test against a live broker
//!
//! Requires Kafka on localhost:9092 with topic auto-creation enabled:
//!
//! ```bash
//! docker run -d --name kafka -p 9092:9092 apache/kafka:latest
//! cargo test -p acm-processor --test kafka_roundtrip -- --ignored --nocapture
//! ```

use acm_config::{PipelineConfig, StartOffset};
use acm_processor::codec::OctetStringCodec;
use acm_processor::kafka::{KafkaSink, MessageSink};
use acm_processor::runner::run;
use acm_processor::ShutdownSignal;
use std::time::Duration;

#[tokio::test]
#[ignore] // Requires Kafka running
async fn test_transcodes_to_output_topic() {
    let suffix = chrono::Utc::now().timestamp_millis();
    let input = format!("acm-test-input-{}", suffix);
    let output = format!("acm-test-output-{}", suffix);

    let config = PipelineConfig {
        brokers: "localhost:9092".to_string(),
        group_id: format!("acm-test-{}", suffix),
        consumer_topics: vec![input.clone()],
        producer_topic: output,
        offset: Some(StartOffset::Beginning),
        exit_on_eof: true,
        ..Default::default()
    };

    let sink = KafkaSink::new(&config).expect("Failed to create producer");
    sink.produce(&input, None, &[0x02, 0xCA, 0xFE])
        .expect("Failed to enqueue message");
    sink.flush(Duration::from_secs(10))
        .expect("Failed to flush producer");

    let shutdown = ShutdownSignal::new();
    let counters = tokio::time::timeout(
        Duration::from_secs(60),
        run(&config, OctetStringCodec::default(), &shutdown),
    )
    .await
    .expect("Run did not finish")
    .expect("Run failed");

    assert_eq!(counters.received.count, 1);
    assert_eq!(counters.sent.count, 1);
}
