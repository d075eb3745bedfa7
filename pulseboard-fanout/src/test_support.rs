//! Shared test doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use pulseboard_types::{Connection, ConnectionId};

use crate::{ConnectionGateway, ConnectionRegistry, DeliveryError, RegistryError};

/// Gateway that accepts everything and remembers what it was given.
#[derive(Debug, Default)]
pub(crate) struct RecordingGateway {
    pub(crate) sent: Mutex<Vec<(ConnectionId, Vec<u8>)>>,
}

impl RecordingGateway {
    pub(crate) fn payloads_for(&self, id: &str) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| c.as_str() == id)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl ConnectionGateway for RecordingGateway {
    async fn post(&self, connection_id: &ConnectionId, payload: &[u8]) -> Result<(), DeliveryError> {
        self.sent.lock().push((connection_id.clone(), payload.to_vec()));
        Ok(())
    }
}

/// Registry whose writes always fail.
///
/// Listing fails too unless built with [`BrokenRegistry::listing`].
#[derive(Debug, Default)]
pub(crate) struct BrokenRegistry {
    listed: Option<Vec<Connection>>,
}

impl BrokenRegistry {
    pub(crate) fn listing(ids: &[&str]) -> Self {
        Self {
            listed: Some(ids.iter().map(|id| Connection::new(*id)).collect()),
        }
    }
}

#[async_trait]
impl ConnectionRegistry for BrokenRegistry {
    async fn put(&self, _connection: Connection) -> Result<(), RegistryError> {
        Err(RegistryError::Unavailable("down".into()))
    }

    async fn remove(&self, _connection_id: &ConnectionId) -> Result<bool, RegistryError> {
        Err(RegistryError::Unavailable("down".into()))
    }

    async fn list_all(&self) -> Result<Vec<Connection>, RegistryError> {
        self.listed
            .clone()
            .ok_or_else(|| RegistryError::Unavailable("down".into()))
    }
}
