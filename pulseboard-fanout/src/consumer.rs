//! Stream consumer: reads batches from an [`EventLog`] and hands each event to
//! the [`Broadcaster`].

use std::sync::Arc;
use std::time::Duration;

use pulseboard_types::Event;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::{Broadcaster, EventLog, FanoutStats, LogRecord};

/// Batching and retry knobs for a [`StreamConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Largest number of records pulled in one read.
    pub batch_size: usize,
    /// How long a partial batch may wait for more records.
    pub max_wait: Duration,
    /// Pause between attempts after a failed read.
    pub retry_interval: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_wait: Duration::from_secs(1),
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Pulls events off a log and broadcasts them one at a time.
///
/// Records within a batch are forwarded in log order, so the order seen by
/// subscribers matches the partition order. A record that does not decode as
/// an [`Event`] is logged and skipped; it never aborts the rest of the batch.
/// The batch is committed once every record in it has been handed to the
/// broadcaster.
#[derive(Debug)]
pub struct StreamConsumer<L> {
    log: L,
    broadcaster: Broadcaster,
    config: ConsumerConfig,
    stats: Arc<FanoutStats>,
}

impl<L: EventLog> StreamConsumer<L> {
    pub fn new(log: L, broadcaster: Broadcaster, config: ConsumerConfig) -> Self {
        let stats = broadcaster.stats().clone();
        Self {
            log,
            broadcaster,
            config,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<FanoutStats> {
        &self.stats
    }

    /// Forward every decodable record in `records`, in order.
    ///
    /// Returns the number of events handed to the broadcaster.
    pub async fn process_batch(&self, records: &[LogRecord]) -> usize {
        let mut forwarded = 0;
        for record in records {
            let event: Event = match serde_json::from_slice(&record.data) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "Skipping undecodable record {}/{}: {}",
                        record.partition, record.offset, e
                    );
                    self.stats.record_decode_error();
                    continue;
                }
            };

            self.stats.record_event();
            let report = self.broadcaster.broadcast(&event).await;
            debug!(
                "Event {} delivered to {}/{} connections",
                event.id, report.delivered, report.attempted
            );
            forwarded += 1;
        }
        forwarded
    }

    /// Consume until `stop` flips to `true`, its sender is dropped, or the log
    /// ends. Returns the log so callers can inspect or reuse it.
    ///
    /// A stop request cancels a read that is still collecting its batch. The
    /// log keeps whatever that read had taken, so nothing uncommitted is lost.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> L {
        info!("Consuming events from {}", self.log.description());

        loop {
            if *stop.borrow() {
                break;
            }

            let next = tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.log.next_batch(self.config.batch_size, self.config.max_wait) => next,
            };

            match next {
                Ok(Some(records)) => {
                    if records.is_empty() {
                        continue;
                    }
                    self.process_batch(&records).await;
                    if let Err(e) = self.log.commit(&records).await {
                        warn!("Failed to commit batch of {}: {}", records.len(), e);
                    }
                }
                Ok(None) => {
                    info!("Log {} ended", self.log.description());
                    break;
                }
                Err(e) => {
                    warn!(
                        "Failed to read from {}: {}, retrying in {:?}",
                        self.log.description(),
                        e,
                        self.config.retry_interval
                    );
                    tokio::select! {
                        changed = stop.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.config.retry_interval) => {}
                    }
                }
            }
        }

        info!("Consumer stopped");
        self.log
    }
}

impl<L: EventLog + 'static> StreamConsumer<L> {
    /// Run the consumer on a background task.
    ///
    /// Dropping the returned handle also stops the consumer.
    pub fn spawn(self) -> ConsumerHandle<L> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        ConsumerHandle { stop_tx, task }
    }
}

/// Handle for a consumer started with [`StreamConsumer::spawn`].
#[derive(Debug)]
pub struct ConsumerHandle<L> {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<L>,
}

impl<L> ConsumerHandle<L> {
    /// Ask the consumer to stop once the batch being broadcast is committed.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the consumer task to finish.
    pub async fn join(self) -> Result<L, JoinError> {
        let ConsumerHandle { stop_tx, task } = self;
        let result = task.await;
        drop(stop_tx);
        result
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingGateway;
    use crate::{ChannelLog, ConnectionRegistry, InMemoryRegistry, LogError};
    use async_trait::async_trait;
    use pulseboard_types::{Connection, ConnectionId};

    async fn setup() -> (Arc<RecordingGateway>, Broadcaster) {
        let registry = Arc::new(InMemoryRegistry::new());
        registry
            .put(Connection::new(ConnectionId::from("c1")))
            .await
            .unwrap();
        let gateway = Arc::new(RecordingGateway::default());
        let broadcaster = Broadcaster::new(registry, gateway.clone());
        (gateway, broadcaster)
    }

    fn event_json(id: &str, value: f64) -> Vec<u8> {
        serde_json::to_vec(&Event::new(id, id, value, "%", "2024-01-01T00:00:00Z")).unwrap()
    }

    #[tokio::test]
    async fn malformed_record_is_skipped() {
        let (gateway, broadcaster) = setup().await;
        let (tx, log) = ChannelLog::create("test", 16);
        let consumer = StreamConsumer::new(log, broadcaster, ConsumerConfig::default());
        let stats = consumer.stats().clone();

        tx.send(event_json("a", 1.0)).await.unwrap();
        tx.send(b"not json".to_vec()).await.unwrap();
        tx.send(event_json("b", 2.0)).await.unwrap();
        drop(tx);

        let (_stop_tx, stop_rx) = watch::channel(false);
        let log = consumer.run(stop_rx).await;

        let payloads = gateway.payloads_for("c1");
        assert_eq!(payloads.len(), 2);
        let first: Event = serde_json::from_slice(&payloads[0]).unwrap();
        let second: Event = serde_json::from_slice(&payloads[1]).unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(second.id, "b");

        // The malformed record is still committed past
        assert_eq!(log.committed(), 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events, 2);
        assert_eq!(snapshot.decode_errors, 1);
    }

    #[tokio::test]
    async fn process_batch_preserves_order() {
        let (gateway, broadcaster) = setup().await;
        let (_tx, log) = ChannelLog::create("test", 1);
        let consumer = StreamConsumer::new(log, broadcaster, ConsumerConfig::default());

        let records: Vec<LogRecord> = (0..5)
            .map(|i| LogRecord::new("0", i, event_json(&format!("m{}", i), i as f64)))
            .collect();

        assert_eq!(consumer.process_batch(&records).await, 5);

        let ids: Vec<String> = gateway
            .payloads_for("c1")
            .iter()
            .map(|p| serde_json::from_slice::<Event>(p).unwrap().id)
            .collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_an_idle_consumer() {
        let (_gateway, broadcaster) = setup().await;
        let (_tx, log) = ChannelLog::create("idle", 4);
        let handle = StreamConsumer::new(log, broadcaster, ConsumerConfig::default()).spawn();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_finished());

        handle.stop();
        let log = handle.join().await.unwrap();
        assert_eq!(log.committed(), 0);
    }

    #[tokio::test]
    async fn boxed_log_runs_on_background_task() {
        let (gateway, broadcaster) = setup().await;
        let (tx, log) = ChannelLog::create("boxed", 4);
        let log: Box<dyn EventLog> = Box::new(log);
        let handle = StreamConsumer::new(log, broadcaster, ConsumerConfig::default()).spawn();

        tx.send(event_json("cpu", 1.0)).await.unwrap();
        drop(tx);

        let log = handle.join().await.unwrap();
        assert_eq!(log.description(), "channel: boxed");
        assert_eq!(gateway.payloads_for("c1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_batch_leaves_records_in_the_log() {
        let (gateway, broadcaster) = setup().await;
        let (tx, log) = ChannelLog::create("partial", 16);
        let config = ConsumerConfig {
            batch_size: 10,
            max_wait: Duration::from_secs(5),
            ..ConsumerConfig::default()
        };
        let handle = StreamConsumer::new(log, broadcaster, config).spawn();

        tx.send(event_json("a", 1.0)).await.unwrap();
        tx.send(event_json("b", 2.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.stop();
        let mut log = handle.join().await.unwrap();
        assert!(gateway.payloads_for("c1").is_empty());
        assert_eq!(log.committed(), 0);

        drop(tx);
        let batch = log
            .next_batch(10, Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        let offsets: Vec<u64> = batch.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 1]);
    }

    #[derive(Debug)]
    struct FlakyLog {
        failures_left: usize,
        delivered: bool,
        committed: Vec<u64>,
    }

    #[async_trait]
    impl EventLog for FlakyLog {
        async fn next_batch(
            &mut self,
            _max_records: usize,
            _max_wait: Duration,
        ) -> Result<Option<Vec<LogRecord>>, LogError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(LogError::Read("shard iterator expired".into()));
            }
            if self.delivered {
                return Ok(None);
            }
            self.delivered = true;
            Ok(Some(vec![LogRecord::new("0", 7, event_json("cpu", 5.0))]))
        }

        async fn commit(&mut self, records: &[LogRecord]) -> Result<(), LogError> {
            self.committed.extend(records.iter().map(|r| r.offset));
            Ok(())
        }

        fn description(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_are_retried() {
        let (gateway, broadcaster) = setup().await;
        let log = FlakyLog {
            failures_left: 2,
            delivered: false,
            committed: Vec::new(),
        };
        let consumer = StreamConsumer::new(log, broadcaster, ConsumerConfig::default());

        let start = tokio::time::Instant::now();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let log = consumer.run(stop_rx).await;

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(log.committed, vec![7]);
        assert_eq!(gateway.payloads_for("c1").len(), 1);
    }
}
