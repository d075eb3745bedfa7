//! Partitioned event log abstraction.
//!
//! The stream consumer reads ordered batches from an [`EventLog`] and commits
//! its position once a batch has been handed to the broadcaster. Concrete
//! logs live here (in-process channels, line-delimited streams) and in
//! `pulseboard-adapters` (Kafka, NATS JetStream).

mod channel;

pub use channel::ChannelLog;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::LogError;

/// One raw record read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Partition (shard) the record was read from.
    pub partition: String,
    /// Position of the record within its partition.
    pub offset: u64,
    /// Undecoded payload.
    pub data: Vec<u8>,
}

impl LogRecord {
    pub fn new(partition: impl Into<String>, offset: u64, data: Vec<u8>) -> Self {
        Self {
            partition: partition.into(),
            offset,
            data,
        }
    }
}

/// A log of events read from the latest position onwards.
///
/// Records emitted before the log was opened are not replayed.
#[async_trait]
pub trait EventLog: Send + Sync + Debug {
    /// Wait for the next batch of at most `max_records` records.
    ///
    /// Waits for at least one record, then keeps collecting for up to
    /// `max_wait`. Logs that poll a remote server may return an empty batch
    /// when nothing arrived in time. Returns `Ok(None)` once the log has ended.
    ///
    /// The consumer drops this future when asked to stop. Records read before
    /// that point must either be returned by the next call or stay uncommitted.
    async fn next_batch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Result<Option<Vec<LogRecord>>, LogError>;

    /// Commit the read position past every record in `batch`.
    async fn commit(&mut self, batch: &[LogRecord]) -> Result<(), LogError>;

    /// Human-readable description for logging.
    fn description(&self) -> &str;
}

#[async_trait]
impl<L: EventLog + ?Sized> EventLog for Box<L> {
    async fn next_batch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Result<Option<Vec<LogRecord>>, LogError> {
        (**self).next_batch(max_records, max_wait).await
    }

    async fn commit(&mut self, batch: &[LogRecord]) -> Result<(), LogError> {
        (**self).commit(batch).await
    }

    fn description(&self) -> &str {
        (**self).description()
    }
}
