//! Transport seam between the connection manager and the wire.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a transport or while establishing one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The transport refused or failed to write a frame.
    #[error("send failed: {0}")]
    Send(String),

    /// The transport is already closed.
    #[error("transport closed")]
    Closed,
}

/// Something that happened on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the server.
    Message(String),
    /// The transport closed, from either side.
    Closed { code: Option<u16>, reason: String },
}

/// An open, bidirectional text transport.
///
/// `recv` must be cancel-safe: the manager polls it alongside commands and
/// timers and may drop an in-flight call.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next event. Once `Closed` has been returned the transport
    /// is not polled again.
    async fn recv(&mut self) -> TransportEvent;

    async fn close(&mut self);
}

/// Opens new transports to a fixed endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Endpoint description for logging.
    fn endpoint(&self) -> &str;
}
