//! Connection directory entries.

use std::fmt;

/// Opaque connection identifier assigned by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A subscriber connection known to be reachable.
///
/// Created when the transport handshake completes; destroyed on an explicit
/// close notification or when delivery reports the peer as gone.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Connection {
    pub connection_id: ConnectionId,

    /// Unix timestamp in milliseconds when the connection was registered.
    pub registered_at_ms: u64,
}

impl Connection {
    /// Create a connection registered now.
    pub fn new(connection_id: impl Into<ConnectionId>) -> Self {
        Self::with_timestamp(connection_id, crate::current_timestamp_ms())
    }

    /// Create a connection with a specific registration time.
    pub fn with_timestamp(connection_id: impl Into<ConnectionId>, registered_at_ms: u64) -> Self {
        Self {
            connection_id: connection_id.into(),
            registered_at_ms,
        }
    }
}
