//! Scripted broker doubles
//!
//! [`ScriptedSource`] replays a fixed list of deliveries and metadata
//! snapshots; [`RecordingSink`] keeps every produced message in memory.
//! Together they drive the gate, the loop and [`crate::runner`] without a
//! broker. A shared [`CallLog`] records the order of lifecycle calls across
//! both doubles.

use acm_config::StartOffset;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{ProcessorError, Result};
use crate::kafka::{
    Delivery, InboundMessage, MessageSink, MessageSource, MessageTimestamp, ProduceError,
    TopicMetadata,
};
use crate::shutdown::ShutdownSignal;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a message on partition 0 with a create-time timestamp
pub fn message(topic: &str, offset: i64, payload: &[u8]) -> InboundMessage {
    InboundMessage {
        topic: topic.to_string(),
        partition: 0,
        offset,
        payload: Some(payload.to_vec()),
        key: None,
        timestamp: Some(MessageTimestamp::CreateTime(1_700_000_000_000 + offset)),
    }
}

/// Ordered record of subscribe, close and flush calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &'static str) {
        lock(&self.0).push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.0).clone()
    }
}

/// A recorded subscribe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeCall {
    pub topics: Vec<String>,
    pub offset: Option<StartOffset>,
    pub partition: Option<i32>,
}

/// Source that replays scripted deliveries and metadata snapshots
///
/// Once the delivery script runs out the source requests shutdown and
/// reports a timeout, so every scripted run terminates.
pub struct ScriptedSource {
    shutdown: ShutdownSignal,
    deliveries: VecDeque<Delivery>,
    snapshots: Mutex<VecDeque<std::result::Result<Vec<String>, String>>>,
    consume_calls: usize,
    metadata_queries: AtomicUsize,
    shutdown_on_consume: Option<usize>,
    shutdown_on_query: Option<usize>,
    subscribe_error: Option<String>,
    subscriptions: Mutex<Vec<SubscribeCall>>,
    closed: AtomicBool,
    call_log: Option<CallLog>,
}

impl ScriptedSource {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self {
            shutdown,
            deliveries: VecDeque::new(),
            snapshots: Mutex::new(VecDeque::new()),
            consume_calls: 0,
            metadata_queries: AtomicUsize::new(0),
            shutdown_on_consume: None,
            shutdown_on_query: None,
            subscribe_error: None,
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            call_log: None,
        }
    }

    /// Record successful subscribe and close calls in `log`
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Queue a delivery
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.deliveries.push_back(delivery);
        self
    }

    /// Queue a metadata snapshot; an `Err` simulates a failed query
    ///
    /// Queries past the last snapshot see no topics.
    pub fn with_metadata(self, snapshot: std::result::Result<Vec<String>, String>) -> Self {
        lock(&self.snapshots).push_back(snapshot);
        self
    }

    /// Request shutdown during the `n`th consume call, which then times out
    pub fn shutdown_on_consume(mut self, n: usize) -> Self {
        self.shutdown_on_consume = Some(n);
        self
    }

    /// Request shutdown during the `n`th metadata query
    pub fn shutdown_on_metadata_query(mut self, n: usize) -> Self {
        self.shutdown_on_query = Some(n);
        self
    }

    /// Make subscribe fail with `reason`
    pub fn fail_subscribe(mut self, reason: &str) -> Self {
        self.subscribe_error = Some(reason.to_string());
        self
    }

    pub fn consume_calls(&self) -> usize {
        self.consume_calls
    }

    pub fn metadata_queries(&self) -> usize {
        self.metadata_queries.load(Ordering::SeqCst)
    }

    pub fn remaining_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    pub fn subscriptions(&self) -> Vec<SubscribeCall> {
        lock(&self.subscriptions).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn subscribe(
        &self,
        topics: &[String],
        offset: Option<StartOffset>,
        partition: Option<i32>,
    ) -> Result<()> {
        if let Some(reason) = &self.subscribe_error {
            return Err(ProcessorError::Subscription {
                topics: topics.to_vec(),
                reason: reason.clone(),
            });
        }

        lock(&self.subscriptions).push(SubscribeCall {
            topics: topics.to_vec(),
            offset,
            partition,
        });
        if let Some(log) = &self.call_log {
            log.record("subscribe");
        }
        Ok(())
    }

    async fn consume(&mut self, _timeout: Duration) -> Delivery {
        self.consume_calls += 1;

        if self.shutdown_on_consume == Some(self.consume_calls) {
            self.shutdown.request_shutdown();
            return Delivery::Timeout;
        }

        match self.deliveries.pop_front() {
            Some(delivery) => delivery,
            None => {
                self.shutdown.request_shutdown();
                Delivery::Timeout
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(log) = &self.call_log {
            log.record("close");
        }
    }
}

#[async_trait]
impl TopicMetadata for ScriptedSource {
    async fn topic_names(&self, _timeout: Duration) -> Result<Vec<String>> {
        let query = self.metadata_queries.fetch_add(1, Ordering::SeqCst) + 1;
        if self.shutdown_on_query == Some(query) {
            self.shutdown.request_shutdown();
        }

        match lock(&self.snapshots).pop_front() {
            Some(Ok(names)) => Ok(names),
            Some(Err(reason)) => Err(ProcessorError::Kafka {
                source: reason.into(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// A message handed to [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedMessage {
    pub topic: String,
    pub partition: Option<i32>,
    pub payload: Vec<u8>,
}

/// Sink that keeps produced messages in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    produced: Mutex<Vec<ProducedMessage>>,
    fail: AtomicBool,
    flushes: AtomicUsize,
    call_log: Option<CallLog>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record flush calls in `log`
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Make subsequent produce calls fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn produced(&self) -> Vec<ProducedMessage> {
        lock(&self.produced).clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl MessageSink for RecordingSink {
    fn produce(
        &self,
        topic: &str,
        partition: Option<i32>,
        payload: &[u8],
    ) -> std::result::Result<(), ProduceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProduceError {
                topic: topic.to_string(),
                bytes: payload.len(),
                reason: "Local: Queue full".to_string(),
            });
        }

        lock(&self.produced).push(ProducedMessage {
            topic: topic.to_string(),
            partition,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.call_log {
            log.record("flush");
        }
        Ok(())
    }
}
