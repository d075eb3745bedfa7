//! Fan-out of one event to every registered connection.

use std::sync::Arc;

use futures_util::future::join_all;
use pulseboard_types::{ConnectionId, Event};
use tracing::{debug, error, info, warn};

use crate::{ConnectionGateway, ConnectionRegistry, DeliveryError, FanoutStats};

/// Per-broadcast delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections listed in the registry when the broadcast started.
    pub attempted: usize,
    /// Connections that accepted the payload.
    pub delivered: usize,
    /// Connections reported gone and removed from the registry.
    pub evicted: usize,
    /// Connections that failed transiently and were kept.
    pub failed: usize,
}

enum Outcome {
    Delivered,
    Evicted,
    Failed,
}

/// Delivers payloads to every connection in the registry.
///
/// The connection list is snapshotted before the fan-out begins; no registry
/// lock is held while a delivery is in flight. Deliveries run concurrently so
/// one slow peer does not hold up the rest.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use pulseboard_fanout::{Broadcaster, ConnectionGateway, InMemoryRegistry};
/// use pulseboard_types::Event;
///
/// # async fn run(gateway: Arc<dyn ConnectionGateway>) {
/// let registry = Arc::new(InMemoryRegistry::new());
/// let broadcaster = Broadcaster::new(registry, gateway);
///
/// let event = Event::new("cpu", "CPU Usage", 42.0, "%", "2024-01-01T00:00:00Z");
/// let report = broadcaster.broadcast(&event).await;
/// println!("delivered to {} connections", report.delivered);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<dyn ConnectionRegistry>,
    gateway: Arc<dyn ConnectionGateway>,
    stats: Arc<FanoutStats>,
}

impl Broadcaster {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, gateway: Arc<dyn ConnectionGateway>) -> Self {
        Self {
            registry,
            gateway,
            stats: Arc::new(FanoutStats::new()),
        }
    }

    /// Share a stats instance with other components.
    pub fn with_stats(mut self, stats: Arc<FanoutStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<FanoutStats> {
        &self.stats
    }

    /// Serialize `event` and deliver it to every registered connection.
    pub async fn broadcast(&self, event: &Event) -> BroadcastReport {
        match serde_json::to_vec(event) {
            Ok(payload) => self.broadcast_payload(&payload).await,
            Err(e) => {
                error!("Failed to encode event {}: {}", event.id, e);
                BroadcastReport::default()
            }
        }
    }

    /// Deliver a pre-encoded payload to every registered connection.
    ///
    /// Returns once every per-connection attempt has completed.
    pub async fn broadcast_payload(&self, payload: &[u8]) -> BroadcastReport {
        let connections = match self.registry.list_all().await {
            Ok(connections) => connections,
            Err(e) => {
                warn!("Skipping broadcast, could not list connections: {}", e);
                self.stats.record_registry_failure();
                return BroadcastReport::default();
            }
        };

        if connections.is_empty() {
            debug!("No active connections");
        }

        let outcomes = join_all(
            connections
                .iter()
                .map(|connection| self.deliver(&connection.connection_id, payload)),
        )
        .await;

        let mut report = BroadcastReport {
            attempted: connections.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Evicted => report.evicted += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        self.stats.record_broadcast(&report);
        report
    }

    async fn deliver(&self, connection_id: &ConnectionId, payload: &[u8]) -> Outcome {
        match self.gateway.post(connection_id, payload).await {
            Ok(()) => Outcome::Delivered,
            Err(DeliveryError::Gone(_)) => {
                info!("Connection {} is gone, removing from registry", connection_id);
                if let Err(e) = self.registry.remove(connection_id).await {
                    warn!("Failed to remove stale connection {}: {}", connection_id, e);
                    self.stats.record_registry_failure();
                }
                Outcome::Evicted
            }
            Err(e) => {
                warn!("{}", e);
                Outcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::BrokenRegistry;
    use crate::InMemoryRegistry;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pulseboard_types::Connection;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Accept,
        Gone,
        Fail,
        Slow(Duration),
    }

    #[derive(Debug, Default)]
    struct ScriptedGateway {
        behavior: Mutex<HashMap<ConnectionId, Behavior>>,
        received: Mutex<Vec<(ConnectionId, Vec<u8>, Instant)>>,
    }

    impl ScriptedGateway {
        fn set(&self, id: &str, behavior: Behavior) {
            self.behavior.lock().insert(ConnectionId::from(id), behavior);
        }

        fn received_by(&self, id: &str) -> Vec<Vec<u8>> {
            self.received
                .lock()
                .iter()
                .filter(|(c, _, _)| c.as_str() == id)
                .map(|(_, p, _)| p.clone())
                .collect()
        }

        fn received_at(&self, id: &str) -> Option<Instant> {
            self.received
                .lock()
                .iter()
                .find(|(c, _, _)| c.as_str() == id)
                .map(|(_, _, at)| *at)
        }
    }

    #[async_trait]
    impl ConnectionGateway for ScriptedGateway {
        async fn post(&self, connection_id: &ConnectionId, payload: &[u8]) -> Result<(), DeliveryError> {
            let behavior = self
                .behavior
                .lock()
                .get(connection_id)
                .copied()
                .unwrap_or(Behavior::Accept);

            match behavior {
                Behavior::Accept => {}
                Behavior::Gone => return Err(DeliveryError::Gone(connection_id.clone())),
                Behavior::Fail => return Err(DeliveryError::transient(connection_id, "throttled")),
                Behavior::Slow(delay) => tokio::time::sleep(delay).await,
            }

            self.received
                .lock()
                .push((connection_id.clone(), payload.to_vec(), Instant::now()));
            Ok(())
        }
    }

    async fn setup(ids: &[&str]) -> (Arc<InMemoryRegistry>, Arc<ScriptedGateway>, Broadcaster) {
        let registry = Arc::new(InMemoryRegistry::new());
        for id in ids {
            registry.put(Connection::new(*id)).await.unwrap();
        }
        let gateway = Arc::new(ScriptedGateway::default());
        let broadcaster = Broadcaster::new(registry.clone(), gateway.clone());
        (registry, gateway, broadcaster)
    }

    fn sample_event() -> Event {
        Event::new("cpu", "CPU Usage", 55.5, "%", "2024-01-01T00:00:00Z")
    }

    #[tokio::test]
    async fn every_connection_receives_the_event() {
        let (_registry, gateway, broadcaster) = setup(&["a", "b", "c"]).await;

        let report = broadcaster.broadcast(&sample_event()).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        for id in ["a", "b", "c"] {
            let payloads = gateway.received_by(id);
            assert_eq!(payloads.len(), 1);
            let decoded: Event = serde_json::from_slice(&payloads[0]).unwrap();
            assert_eq!(decoded, sample_event());
        }
    }

    #[tokio::test]
    async fn gone_connection_is_evicted() {
        let (registry, gateway, broadcaster) = setup(&["a", "b"]).await;
        gateway.set("b", Behavior::Gone);

        let report = broadcaster.broadcast(&sample_event()).await;
        assert_eq!(report.evicted, 1);
        assert!(!registry.contains(&ConnectionId::from("b")));

        let report = broadcaster.broadcast(&sample_event()).await;
        assert_eq!(report.attempted, 1);
        assert_eq!(gateway.received_by("a").len(), 2);
    }

    #[tokio::test]
    async fn transient_failure_keeps_connection() {
        let (registry, gateway, broadcaster) = setup(&["a", "b"]).await;
        gateway.set("b", Behavior::Fail);

        let report = broadcaster.broadcast(&sample_event()).await;
        assert_eq!(report.failed, 1);
        assert!(registry.contains(&ConnectionId::from("b")));

        gateway.set("b", Behavior::Accept);
        let report = broadcaster.broadcast(&sample_event()).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(gateway.received_by("b").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connection_does_not_delay_others() {
        let (_registry, gateway, broadcaster) = setup(&["fast", "slow"]).await;
        gateway.set("slow", Behavior::Slow(Duration::from_secs(10)));

        let started = Instant::now();
        let report = broadcaster.broadcast(&sample_event()).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(gateway.received_at("fast"), Some(started));
        assert_eq!(
            gateway.received_at("slow"),
            Some(started + Duration::from_secs(10))
        );
    }

    #[tokio::test]
    async fn registry_failure_skips_broadcast() {
        let gateway = Arc::new(ScriptedGateway::default());
        let broadcaster = Broadcaster::new(Arc::new(BrokenRegistry::default()), gateway.clone());

        let report = broadcaster.broadcast(&sample_event()).await;

        assert_eq!(report, BroadcastReport::default());
        assert_eq!(broadcaster.stats().snapshot().registry_failures, 1);
    }

    #[tokio::test]
    async fn gone_connection_counts_as_evicted_when_removal_fails() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.set("a", Behavior::Gone);
        let registry = Arc::new(BrokenRegistry::listing(&["a", "b"]));
        let broadcaster = Broadcaster::new(registry, gateway.clone());

        let report = broadcaster.broadcast(&sample_event()).await;

        assert_eq!(report.evicted, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(broadcaster.stats().snapshot().registry_failures, 1);
    }

    #[tokio::test]
    async fn stats_accumulate() {
        let (_registry, gateway, broadcaster) = setup(&["a", "b", "c"]).await;
        gateway.set("b", Behavior::Gone);
        gateway.set("c", Behavior::Fail);

        broadcaster.broadcast(&sample_event()).await;
        broadcaster.broadcast(&sample_event()).await;

        let stats = broadcaster.stats().snapshot();
        assert_eq!(stats.broadcasts, 2);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.delivery_failures, 2);
    }

    #[tokio::test]
    async fn empty_registry_attempts_nothing() {
        let (_registry, _gateway, broadcaster) = setup(&[]).await;
        let report = broadcaster.broadcast(&sample_event()).await;
        assert_eq!(report.attempted, 0);
    }
}
