//! Error types for adapters.

use thiserror::Error;

/// Errors raised while setting up an adapter.
///
/// Once running, adapters report through the fan-out error types
/// (`LogError`, `RegistryError`, `DeliveryError`) instead.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP client setup failed.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Failed to parse a setting or response.
    #[error("Failed to parse: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for the backend.
    #[error("Request timed out")]
    Timeout,
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for AdapterError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else {
            AdapterError::Connection(err.to_string())
        }
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for AdapterError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        AdapterError::Connection(err.to_string())
    }
}
