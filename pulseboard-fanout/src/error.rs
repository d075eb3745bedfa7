//! Error types for the fan-out pipeline.

use pulseboard_types::ConnectionId;
use thiserror::Error;

/// Errors from the connection directory.
///
/// Always treated as transient infrastructure failures: the caller logs them
/// and moves on.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backing store could not be reached.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// A stored entry could not be encoded or decoded.
    #[error("registry entry is malformed: {0}")]
    Malformed(String),
}

/// Outcome of a failed "post payload to connection".
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The peer no longer exists (HTTP 410 equivalent). Terminal for the connection.
    #[error("connection {0} is gone")]
    Gone(ConnectionId),

    /// Any other failure. The connection stays registered.
    #[error("delivery to {connection_id} failed: {reason}")]
    Transient {
        connection_id: ConnectionId,
        reason: String,
    },
}

impl DeliveryError {
    /// Create a transient error.
    pub fn transient(connection_id: &ConnectionId, reason: impl Into<String>) -> Self {
        DeliveryError::Transient {
            connection_id: connection_id.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the peer is permanently gone.
    pub fn is_gone(&self) -> bool {
        matches!(self, DeliveryError::Gone(_))
    }
}

/// Errors from reading or committing the event log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Fetching the next batch failed.
    #[error("log read failed: {0}")]
    Read(String),

    /// Committing the read position failed.
    #[error("log commit failed: {0}")]
    Commit(String),

    /// The log could not be opened or subscribed to.
    #[error("log connection failed: {0}")]
    Connection(String),
}
