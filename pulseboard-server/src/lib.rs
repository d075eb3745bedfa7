//! # pulseboard-server
//!
//! The relay process: reads metric events from a log and fans each one out
//! to every live subscriber.
//!
//! ```text
//!  stdin | tcp | kafka | nats
//!            │
//!            ▼
//!     StreamConsumer ──▶ Broadcaster ──▶ ConnectionGateway ──▶ subscribers
//!                            │                 (websocket | http)
//!                            ▼
//!                   ConnectionRegistry (memory | redis)
//! ```
//!
//! Backends are chosen in [`RelayConfig`] and opened by
//! [`Relay::from_config`]. Kafka, NATS, Redis and HTTP support sit behind
//! cargo features of the same names; the WebSocket endpoint is on by default.
//!
//! ## Usage
//!
//! ```bash
//! # Events as newline-delimited JSON on stdin, subscribers on ws://localhost:3001
//! producer | pulseboard-relay
//!
//! # Backends from a config file
//! pulseboard-relay --config relay.toml
//! ```

pub mod config;
pub mod relay;

pub use config::{ConsumerSettings, GatewayConfig, RegistryConfig, RelayConfig, SourceConfig};
pub use relay::{Relay, RelayGateway};
