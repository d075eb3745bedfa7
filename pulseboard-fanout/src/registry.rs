//! The connection directory.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use parking_lot::RwLock;
use pulseboard_types::{Connection, ConnectionId};

use crate::RegistryError;

/// Directory of currently reachable subscriber connections.
///
/// This is the single source of truth for who may receive a broadcast.
/// Implementations must tolerate concurrent `put`/`remove`/`list_all` from
/// independent callers; a `put` racing a `list_all` may or may not be visible
/// to that listing.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync + Debug {
    /// Insert or replace the entry for `connection.connection_id`.
    async fn put(&self, connection: Connection) -> Result<(), RegistryError>;

    /// Delete an entry. Absent ids are not an error.
    ///
    /// Returns whether an entry was removed.
    async fn remove(&self, connection_id: &ConnectionId) -> Result<bool, RegistryError>;

    /// Snapshot of all current entries.
    async fn list_all(&self) -> Result<Vec<Connection>, RegistryError>;
}

/// In-process registry backed by a lock-guarded map.
///
/// Lock guards never live across an await point, so a listing is a plain
/// clone of the map at one instant.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    connections: RwLock<BTreeMap<ConnectionId, Connection>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Check whether `connection_id` is registered.
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.read().contains_key(connection_id)
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryRegistry {
    async fn put(&self, connection: Connection) -> Result<(), RegistryError> {
        self.connections
            .write()
            .insert(connection.connection_id.clone(), connection);
        Ok(())
    }

    async fn remove(&self, connection_id: &ConnectionId) -> Result<bool, RegistryError> {
        Ok(self.connections.write().remove(connection_id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Connection>, RegistryError> {
        Ok(self.connections.read().values().cloned().collect())
    }
}
