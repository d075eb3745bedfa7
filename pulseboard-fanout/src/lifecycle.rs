//! Connection open/close/message handling driven by the transport layer.

use std::sync::Arc;

use pulseboard_types::{Connection, ConnectionId, ServerEnvelope};
use serde_json::Value;
use tracing::{info, warn};

use crate::{ConnectionGateway, ConnectionRegistry, DeliveryError, FanoutStats, RegistryError};

/// Keeps the registry in step with transport lifecycle events.
///
/// This is the inverse of the broadcaster's pruning: entries are added and
/// removed on explicit open/close notifications. Registry failures are logged
/// and returned to the transport; the handler itself never retries.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycleHandler {
    registry: Arc<dyn ConnectionRegistry>,
    gateway: Arc<dyn ConnectionGateway>,
    stats: Arc<FanoutStats>,
}

impl ConnectionLifecycleHandler {
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

    /// Register a connection whose handshake just completed.
    pub async fn on_open(&self, connection_id: ConnectionId) -> Result<(), RegistryError> {
        let connection = Connection::new(connection_id.clone());
        match self.registry.put(connection).await {
            Ok(()) => {
                info!("Connection {} registered", connection_id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to register connection {}: {}", connection_id, e);
                self.stats.record_registry_failure();
                Err(e)
            }
        }
    }

    /// Deregister a closed connection. Safe to call for an already absent entry.
    pub async fn on_close(&self, connection_id: &ConnectionId) -> Result<(), RegistryError> {
        match self.registry.remove(connection_id).await {
            Ok(true) => {
                info!("Connection {} removed", connection_id);
                Ok(())
            }
            Ok(false) => {
                info!("Connection {} already removed", connection_id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove connection {}: {}", connection_id, e);
                self.stats.record_registry_failure();
                Err(e)
            }
        }
    }

    /// Echo a subscriber message back to its sender inside a [`ServerEnvelope`].
    ///
    /// Bodies that are not JSON are wrapped as `{"message": <body>}`.
    pub async fn on_message(
        &self,
        connection_id: &ConnectionId,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let payload = echo_payload(body, &now_iso());
        match self.gateway.post(connection_id, &payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Failed to echo message to {}: {}", connection_id, e);
                Err(e)
            }
        }
    }
}

fn echo_payload(body: &str, timestamp: &str) -> Vec<u8> {
    let data = if body.is_empty() {
        serde_json::json!({ "message": "" })
    } else {
        serde_json::from_str::<Value>(body).unwrap_or_else(|_| serde_json::json!({ "message": body }))
    };

    let envelope = ServerEnvelope::echo(data, timestamp);
    // Value always serializes
    serde_json::to_vec(&envelope).unwrap_or_default()
}

pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BrokenRegistry, RecordingGateway};
    use crate::InMemoryRegistry;

    fn handler() -> (Arc<InMemoryRegistry>, Arc<RecordingGateway>, ConnectionLifecycleHandler) {
        let registry = Arc::new(InMemoryRegistry::new());
        let gateway = Arc::new(RecordingGateway::default());
        let handler = ConnectionLifecycleHandler::new(registry.clone(), gateway.clone());
        (registry, gateway, handler)
    }

    #[tokio::test]
    async fn open_then_close() {
        let (registry, _gateway, handler) = handler();
        let id = ConnectionId::from("c1");

        handler.on_open(id.clone()).await.unwrap();
        assert!(registry.contains(&id));

        handler.on_close(&id).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_close_is_ok() {
        let (_registry, _gateway, handler) = handler();
        let id = ConnectionId::from("c1");

        handler.on_open(id.clone()).await.unwrap();
        handler.on_close(&id).await.unwrap();
        assert!(handler.on_close(&id).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_open_keeps_one_entry() {
        let (registry, _gateway, handler) = handler();

        handler.on_open(ConnectionId::from("c1")).await.unwrap();
        handler.on_open(ConnectionId::from("c1")).await.unwrap();

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn registry_failures_are_returned_and_counted() {
        let stats = Arc::new(FanoutStats::new());
        let handler = ConnectionLifecycleHandler::new(
            Arc::new(BrokenRegistry::default()),
            Arc::new(RecordingGateway::default()),
        )
        .with_stats(stats.clone());
        let id = ConnectionId::from("c1");

        assert!(matches!(
            handler.on_open(id.clone()).await,
            Err(RegistryError::Unavailable(_))
        ));
        assert_eq!(stats.snapshot().registry_failures, 1);

        assert!(handler.on_close(&id).await.is_err());
        assert_eq!(stats.snapshot().registry_failures, 2);
    }

    #[tokio::test]
    async fn message_is_echoed_to_sender_only() {
        let (_registry, gateway, handler) = handler();
        let id = ConnectionId::from("c1");

        handler
            .on_message(&id, r#"{"action":"message","type":"clear"}"#)
            .await
            .unwrap();

        let sent = gateway.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, id);

        let envelope: Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(envelope["message"], "Message received");
        assert_eq!(envelope["data"]["type"], "clear");
        assert!(envelope["timestamp"].is_string());
    }

    #[test]
    fn non_json_body_is_wrapped() {
        let payload = echo_payload("hello", "T");
        let envelope: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(envelope["data"]["message"], "hello");
        assert_eq!(envelope["timestamp"], "T");
    }
}
