//! NATS JetStream event log.
//!
//! Uses a durable pull consumer that only delivers messages published after it
//! was created. Messages are acknowledged when their batch is committed, so a
//! relay that dies mid-batch gets them redelivered.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulseboard_adapters::nats::NatsLog;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = NatsLog::builder()
//!         .url("nats://localhost:4222")
//!         .stream("METRICS")
//!         .durable("pulseboard-relay")
//!         .build()
//!         .await?;
//!     # let _ = log;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_nats::jetstream::{self, consumer::pull, consumer::AckPolicy, consumer::DeliverPolicy};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use pulseboard_fanout::{EventLog, LogError, LogRecord};

use crate::AdapterError;

/// JetStream-backed [`EventLog`].
pub struct NatsLog {
    consumer: jetstream::consumer::Consumer<pull::Config>,
    stream: String,
    /// Delivered but not yet acknowledged.
    pending: Vec<jetstream::Message>,
    description: String,
}

impl NatsLog {
    /// Create a new builder for configuring the log.
    pub fn builder() -> NatsLogBuilder {
        NatsLogBuilder::default()
    }

    fn to_record(&self, message: &jetstream::Message) -> LogRecord {
        let sequence = message.info().map(|i| i.stream_sequence).unwrap_or(0);
        LogRecord::new(self.stream.clone(), sequence, message.payload.to_vec())
    }
}

#[async_trait]
impl EventLog for NatsLog {
    async fn next_batch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Result<Option<Vec<LogRecord>>, LogError> {
        let messages = self
            .consumer
            .fetch()
            .max_messages(max_records.max(1))
            .expires(max_wait)
            .messages()
            .await
            .map_err(|e| LogError::Read(e.to_string()))?;

        let received = collect_fetch(messages).await?;
        let batch = received.iter().map(|m| self.to_record(m)).collect();
        self.pending.extend(received);

        Ok(Some(batch))
    }

    async fn commit(&mut self, batch: &[LogRecord]) -> Result<(), LogError> {
        debug!(
            "Acknowledging {} messages on {} ({} in batch)",
            self.pending.len(),
            self.stream,
            batch.len()
        );
        for message in self.pending.drain(..) {
            message
                .ack()
                .await
                .map_err(|e| LogError::Commit(e.to_string()))?;
        }
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Drain one fetch. A failed fetch yields nothing, so none of its messages
/// are acknowledged by a later commit and the server redelivers them.
async fn collect_fetch<S, T, E>(messages: S) -> Result<Vec<T>, LogError>
where
    S: Stream<Item = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut messages = std::pin::pin!(messages);
    let mut received = Vec::new();
    while let Some(message) = messages.next().await {
        received.push(message.map_err(|e| LogError::Read(e.to_string()))?);
    }
    Ok(received)
}

impl std::fmt::Debug for NatsLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsLog")
            .field("stream", &self.stream)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Builder for NatsLog.
#[derive(Debug, Default)]
pub struct NatsLogBuilder {
    url: Option<String>,
    credentials: Option<String>,
    stream: Option<String>,
    durable: Option<String>,
}

impl NatsLogBuilder {
    /// Set the NATS server URL (default: "nats://localhost:4222").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the path to a credentials file for authentication.
    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    /// Set the JetStream stream to read (default: "METRICS").
    pub fn stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    /// Set the durable consumer name (default: "pulseboard-relay").
    pub fn durable(mut self, name: impl Into<String>) -> Self {
        self.durable = Some(name.into());
        self
    }

    /// Connect and create (or reuse) the durable consumer.
    pub async fn build(self) -> Result<NatsLog, AdapterError> {
        let url = self
            .url
            .unwrap_or_else(|| "nats://localhost:4222".to_string());
        let stream_name = self.stream.unwrap_or_else(|| "METRICS".to_string());
        let durable = self
            .durable
            .unwrap_or_else(|| "pulseboard-relay".to_string());

        let client = if let Some(creds) = self.credentials {
            async_nats::ConnectOptions::new()
                .credentials_file(&creds)
                .await
                .map_err(|e| AdapterError::Auth(e.to_string()))?
                .connect(&url)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
        } else {
            async_nats::connect(&url)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
        };

        let jetstream = jetstream::new(client);
        let stream = jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    deliver_policy: DeliverPolicy::New,
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        Ok(NatsLog {
            consumer,
            description: format!("nats: {} ({})", stream_name, url),
            stream: stream_name,
            pending: Vec::new(),
        })
    }
}
