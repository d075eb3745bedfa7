//! In-process and line-delimited logs.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{EventLog, LogRecord};
use crate::LogError;

const PARTITION: &str = "0";

/// A single-partition log fed through a channel.
///
/// Offsets count records from zero in arrival order. Useful for tests, for
/// embedding a producer in the same process, and, through
/// [`ChannelLog::spawn_reader`], for newline-delimited JSON over stdin or TCP.
///
/// # Example
///
/// ```
/// use pulseboard_fanout::ChannelLog;
///
/// let (tx, log) = ChannelLog::create("in-process", 16);
/// ```
#[derive(Debug)]
pub struct ChannelLog {
    receiver: mpsc::Receiver<Vec<u8>>,
    description: String,
    /// Records taken off the channel for a batch not yet handed out.
    buffered: Vec<LogRecord>,
    next_offset: u64,
    committed: u64,
}

impl ChannelLog {
    /// Create a log reading from `receiver`.
    pub fn new(receiver: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", description),
            buffered: Vec::new(),
            next_offset: 0,
            committed: 0,
        }
    }

    /// Create a sender/log pair.
    pub fn create(description: &str, buffer: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx, description))
    }

    /// Spawn a background task that reads newline-delimited records from `reader`.
    ///
    /// Blank lines are skipped. The log ends at EOF or on a read error.
    pub fn spawn_reader<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("Stream {} reached EOF", desc);
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if tx.send(trimmed.as_bytes().to_vec()).await.is_err() {
                            // Log dropped
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Read error on {}: {}", desc, e);
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            buffered: Vec::new(),
            next_offset: 0,
            committed: 0,
        }
    }

    /// Offset of the first record not yet committed.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    fn record(&mut self, data: Vec<u8>) -> LogRecord {
        let record = LogRecord::new(PARTITION, self.next_offset, data);
        self.next_offset += 1;
        record
    }
}

#[async_trait]
impl EventLog for ChannelLog {
    async fn next_batch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Result<Option<Vec<LogRecord>>, LogError> {
        // A cancelled call leaves its records in `buffered` for the next one
        if self.buffered.is_empty() {
            match self.receiver.recv().await {
                Some(data) => {
                    let record = self.record(data);
                    self.buffered.push(record);
                }
                None => return Ok(None),
            }
        }

        let deadline = Instant::now() + max_wait;

        while self.buffered.len() < max_records.max(1) {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(data)) => {
                    let record = self.record(data);
                    self.buffered.push(record);
                }
                // Closed or window elapsed; hand over what we have
                Ok(None) | Err(_) => break,
            }
        }

        Ok(Some(std::mem::take(&mut self.buffered)))
    }

    async fn commit(&mut self, batch: &[LogRecord]) -> Result<(), LogError> {
        if let Some(last) = batch.iter().map(|r| r.offset).max() {
            self.committed = self.committed.max(last + 1);
        }
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn batch_collects_up_to_max_records() {
        let (tx, mut log) = ChannelLog::create("test", 16);
        for i in 0..5 {
            tx.send(format!("r{}", i).into_bytes()).await.unwrap();
        }

        let batch = log
            .next_batch(3, Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].offset, 0);
        assert_eq!(batch[2].data, b"r2".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn batch_returns_after_max_wait() {
        let (tx, mut log) = ChannelLog::create("test", 16);
        tx.send(b"only".to_vec()).await.unwrap();

        let started = Instant::now();
        let batch = log
            .next_batch(100, Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn closed_log_returns_none() {
        let (tx, mut log) = ChannelLog::create("test", 16);
        drop(tx);

        let batch = log.next_batch(10, Duration::from_millis(10)).await.unwrap();
        assert!(batch.is_none());
    }

    #[tokio::test]
    async fn commit_advances_position() {
        let (tx, mut log) = ChannelLog::create("test", 16);
        tx.send(b"a".to_vec()).await.unwrap();
        tx.send(b"b".to_vec()).await.unwrap();

        let batch = log
            .next_batch(10, Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        log.commit(&batch).await.unwrap();

        assert_eq!(log.committed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_read_keeps_collected_records() {
        let (tx, mut log) = ChannelLog::create("test", 16);
        tx.send(b"a".to_vec()).await.unwrap();
        tx.send(b"b".to_vec()).await.unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            log.next_batch(10, Duration::from_secs(5)),
        )
        .await;
        assert!(cancelled.is_err());

        tx.send(b"c".to_vec()).await.unwrap();
        let batch = log
            .next_batch(10, Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();

        let offsets: Vec<u64> = batch.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(batch[0].data, b"a".to_vec());
    }

    #[tokio::test]
    async fn reader_skips_blank_lines() {
        let data = "{\"a\":1}\n\n{\"b\":2}\n";
        let mut log = ChannelLog::spawn_reader(Cursor::new(data), "stdin");

        let batch = log
            .next_batch(10, Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].data, b"{\"b\":2}".to_vec());
        assert_eq!(log.description(), "stream: stdin");
    }
}
