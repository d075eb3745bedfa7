//! Server envelope wrapped around echoed subscriber messages.

/// `message` value the relay uses when echoing a subscriber message.
pub const ECHO_MESSAGE: &str = "Message received";

/// Envelope the relay wraps around a message it echoes back to a subscriber.
///
/// Subscribers unwrap `data` before dispatching it to the dashboard merger.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerEnvelope<T> {
    pub message: String,
    pub data: T,
    pub timestamp: String,
}

impl<T> ServerEnvelope<T> {
    /// Wrap `data` as an echo reply.
    pub fn echo(data: T, timestamp: impl Into<String>) -> Self {
        Self {
            message: ECHO_MESSAGE.to_string(),
            data,
            timestamp: timestamp.into(),
        }
    }
}
