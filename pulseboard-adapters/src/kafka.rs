//! Kafka event log.
//!
//! Joins a consumer group on one topic and reads from the latest offset, so
//! events published while the relay was down are not replayed. Auto-commit is
//! off: offsets are committed explicitly once a batch has been broadcast.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulseboard_adapters::kafka::KafkaLog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let log = KafkaLog::builder()
//!     .brokers("localhost:9092")
//!     .group_id("pulseboard-relay")
//!     .topic("dashboard-metrics")
//!     .build()?;
//! # let _ = log;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use tracing::warn;

use pulseboard_fanout::{EventLog, LogError, LogRecord};

use crate::AdapterError;

/// Kafka-backed [`EventLog`].
pub struct KafkaLog {
    consumer: StreamConsumer,
    topic: String,
    description: String,
}

impl KafkaLog {
    /// Create a new builder for configuring the log.
    pub fn builder() -> KafkaLogBuilder {
        KafkaLogBuilder::default()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> LogRecord {
    LogRecord::new(
        message.partition().to_string(),
        message.offset().max(0) as u64,
        message.payload().unwrap_or_default().to_vec(),
    )
}

/// Next offset to consume per partition, i.e. one past the highest offset seen.
fn commit_offsets(batch: &[LogRecord]) -> Result<BTreeMap<i32, i64>, LogError> {
    let mut offsets = BTreeMap::new();
    for record in batch {
        let partition: i32 = record
            .partition
            .parse()
            .map_err(|_| LogError::Commit(format!("invalid partition '{}'", record.partition)))?;
        let next = record.offset as i64 + 1;
        let entry = offsets.entry(partition).or_insert(next);
        if *entry < next {
            *entry = next;
        }
    }
    Ok(offsets)
}

#[async_trait]
impl EventLog for KafkaLog {
    async fn next_batch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Result<Option<Vec<LogRecord>>, LogError> {
        let mut batch = {
            let first = self
                .consumer
                .recv()
                .await
                .map_err(|e| LogError::Read(e.to_string()))?;
            vec![to_record(&first)]
        };

        let deadline = tokio::time::Instant::now() + max_wait;
        while batch.len() < max_records.max(1) {
            match tokio::time::timeout_at(deadline, self.consumer.recv()).await {
                Ok(Ok(message)) => batch.push(to_record(&message)),
                Ok(Err(e)) => {
                    // Keep what we have; the error resurfaces on the next read
                    warn!("Kafka read error mid-batch on {}: {}", self.topic, e);
                    break;
                }
                Err(_) => break,
            }
        }

        Ok(Some(batch))
    }

    async fn commit(&mut self, batch: &[LogRecord]) -> Result<(), LogError> {
        let offsets = commit_offsets(batch)?;
        if offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (partition, offset) in offsets {
            tpl.add_partition_offset(&self.topic, partition, Offset::Offset(offset))
                .map_err(|e| LogError::Commit(e.to_string()))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| LogError::Commit(e.to_string()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Debug for KafkaLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaLog")
            .field("topic", &self.topic)
            .finish()
    }
}

/// Builder for KafkaLog.
#[derive(Debug, Default)]
pub struct KafkaLogBuilder {
    brokers: Option<String>,
    group_id: Option<String>,
    topic: Option<String>,
    session_timeout: Option<Duration>,
}

impl KafkaLogBuilder {
    /// Set the Kafka broker addresses (comma-separated).
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group ID (default: "pulseboard-relay").
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set the topic carrying metric events (default: "dashboard-metrics").
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the group session timeout (default: 10 seconds).
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Build the log and subscribe to the topic.
    pub fn build(self) -> Result<KafkaLog, AdapterError> {
        let brokers = self.brokers.unwrap_or_else(|| "localhost:9092".to_string());
        let group_id = self
            .group_id
            .unwrap_or_else(|| "pulseboard-relay".to_string());
        let topic = self
            .topic
            .unwrap_or_else(|| "dashboard-metrics".to_string());
        let session_timeout = self.session_timeout.unwrap_or(Duration::from_secs(10));

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "false")
            .set(
                "session.timeout.ms",
                session_timeout.as_millis().to_string(),
            )
            .create()?;

        consumer.subscribe(&[topic.as_str()])?;

        Ok(KafkaLog {
            consumer,
            description: format!("kafka: {} ({})", topic, brokers),
            topic,
        })
    }
}
