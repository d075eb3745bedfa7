//! Delivery to a single subscriber connection.

use std::fmt::Debug;

use async_trait::async_trait;
use pulseboard_types::ConnectionId;

use crate::DeliveryError;

/// One-shot "post payload to connection" operation offered by the transport layer.
///
/// Implementations must map a vanished peer to [`DeliveryError::Gone`] and
/// everything else to [`DeliveryError::Transient`].
#[async_trait]
pub trait ConnectionGateway: Send + Sync + Debug {
    async fn post(&self, connection_id: &ConnectionId, payload: &[u8]) -> Result<(), DeliveryError>;
}
