//! # pulseboard-adapters
//!
//! Backends that plug into `pulseboard-fanout`.
//!
//! ## Event logs
//!
//! - **Kafka** (`kafka` feature): consumer group reading from the latest offset
//!   with manual commits
//! - **NATS** (`nats` feature): JetStream pull consumer delivering new messages
//!   only, acknowledged on commit
//!
//! ## Connection registries
//!
//! - **Redis** (`redis` feature): one hash entry per connection, shared by
//!   every relay instance
//!
//! ## Connection gateways
//!
//! - **WebSocket** (`websocket` feature): an axum endpoint that accepts
//!   subscribers directly and drives the lifecycle handler
//! - **HTTP** (`http` feature): posts to an external connection management API
//!   (`POST {endpoint}/@connections/{id}`), where `410 Gone` marks a stale
//!   connection
//!
//! ## Quick Start (Kafka + WebSocket)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pulseboard_adapters::kafka::KafkaLog;
//! use pulseboard_adapters::websocket::WebSocketGateway;
//! use pulseboard_fanout::{Broadcaster, ConsumerConfig, InMemoryRegistry, StreamConsumer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = KafkaLog::builder()
//!         .brokers("localhost:9092")
//!         .topic("metrics")
//!         .build()?;
//!
//!     let registry = Arc::new(InMemoryRegistry::new());
//!     let gateway = WebSocketGateway::new();
//!     let broadcaster = Broadcaster::new(registry, Arc::new(gateway.clone()));
//!
//!     let handle = StreamConsumer::new(log, broadcaster, ConsumerConfig::default()).spawn();
//!     // ... serve gateway.router(..) ...
//!     handle.stop();
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "kafka")]
pub mod kafka;

#[cfg(feature = "nats")]
pub mod nats;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::AdapterError;
