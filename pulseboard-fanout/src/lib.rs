//! # pulseboard-fanout
//!
//! Server side of the pulseboard pipeline: read metric events from a
//! partitioned log and push each one to every live subscriber connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulseboard_fanout::{
//!     Broadcaster, ChannelLog, ConnectionGateway, ConsumerConfig, InMemoryRegistry,
//!     StreamConsumer,
//! };
//!
//! # async fn run(gateway: Arc<dyn ConnectionGateway>) {
//! let registry = Arc::new(InMemoryRegistry::new());
//! let broadcaster = Broadcaster::new(registry, gateway);
//!
//! // Events are newline-delimited JSON on stdin
//! let log = ChannelLog::spawn_reader(tokio::io::stdin(), "stdin");
//! let handle = StreamConsumer::new(log, broadcaster, ConsumerConfig::default()).spawn();
//!
//! tokio::signal::ctrl_c().await.ok();
//! handle.stop();
//! let _ = handle.join().await;
//! # }
//! ```
//!
//! ## Pieces
//!
//! - [`ConnectionRegistry`]: set of open connection ids
//! - [`ConnectionLifecycleHandler`]: adds and removes registry entries on open/close
//! - [`Broadcaster`]: delivers one payload to every registered connection,
//!   evicting the ones the gateway reports as gone
//! - [`StreamConsumer`]: batches records off an [`EventLog`] and forwards them
//!   in order
//!
//! Transports plug in through [`ConnectionGateway`] and [`EventLog`]; see
//! `pulseboard-adapters` for Kafka, NATS, Redis, HTTP and WebSocket backends.

mod broadcaster;
mod consumer;
mod error;
mod gateway;
mod lifecycle;
mod log;
mod registry;
mod stats;

#[cfg(test)]
mod test_support;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use consumer::{ConsumerConfig, ConsumerHandle, StreamConsumer};
pub use error::{DeliveryError, LogError, RegistryError};
pub use gateway::ConnectionGateway;
pub use lifecycle::ConnectionLifecycleHandler;
pub use log::{ChannelLog, EventLog, LogRecord};
pub use registry::{ConnectionRegistry, InMemoryRegistry};
pub use stats::{FanoutStats, FanoutStatsSnapshot};

// Re-export types for convenience
pub use pulseboard_types::{Connection, ConnectionId, Event};
