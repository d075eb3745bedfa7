//! Redis connection registry.
//!
//! Every connection is one field of a single hash (`HSET key id json`), so
//! several relay instances can share the directory and a broadcast lists it
//! with one `HVALS`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use pulseboard_fanout::{ConnectionRegistry, RegistryError};
use pulseboard_types::{Connection, ConnectionId};

use crate::AdapterError;

/// Default hash key holding the connection directory.
pub const DEFAULT_KEY: &str = "pulseboard:connections";

/// [`ConnectionRegistry`] stored in a Redis hash.
#[derive(Clone)]
pub struct RedisRegistry {
    manager: ConnectionManager,
    key: String,
}

impl RedisRegistry {
    /// Connect to `url` and use the hash at `key`.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, AdapterError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for RedisRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRegistry")
            .field("key", &self.key)
            .finish()
    }
}

fn unavailable(err: redis::RedisError) -> RegistryError {
    RegistryError::Unavailable(err.to_string())
}

/// Decode `HVALS` output, dropping entries that are not valid connections.
fn decode_entries(values: Vec<String>) -> Vec<Connection> {
    values
        .into_iter()
        .filter_map(|raw| match serde_json::from_str::<Connection>(&raw) {
            Ok(connection) => Some(connection),
            Err(e) => {
                warn!("Ignoring malformed registry entry {:?}: {}", raw, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl ConnectionRegistry for RedisRegistry {
    async fn put(&self, connection: Connection) -> Result<(), RegistryError> {
        let value =
            serde_json::to_string(&connection).map_err(|e| RegistryError::Malformed(e.to_string()))?;
        let mut conn = self.manager.clone();
        let _: () = conn
            .hset(&self.key, connection.connection_id.as_str(), value)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn remove(&self, connection_id: &ConnectionId) -> Result<bool, RegistryError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn
            .hdel(&self.key, connection_id.as_str())
            .await
            .map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn list_all(&self) -> Result<Vec<Connection>, RegistryError> {
        let mut conn = self.manager.clone();
        let values: Vec<String> = conn.hvals(&self.key).await.map_err(unavailable)?;
        Ok(decode_entries(values))
    }
}
