//! # pulseboard-client
//!
//! Subscriber side of the pulseboard pipeline: a connection manager that keeps
//! one WebSocket alive with exponential backoff, a decoder for the relay's
//! message vocabulary, and a dashboard that merges operations into keyed state.
//!
//! ```text
//!  relay ──ws──▶ ClientConnectionManager ──Operation──▶ Dashboard
//!                 (reconnect, backoff)                  (DashboardState + History)
//! ```
//!
//! - **[`connection`]**: reconnect state machine, [`ReconnectPolicy`] and the
//!   [`Connector`]/[`Transport`] seam with a tungstenite implementation
//! - **[`message`]**: [`parse_message`] turns inbound text into an [`Operation`]
//! - **[`data`]**: pure [`DashboardState`] merger, bounded history, threshold status
//! - **[`dashboard`]**: the view model a renderer reads from
//! - **[`config`]**: file and environment configuration
//!
//! ## Usage
//!
//! ```bash
//! pulseboard-watch --url ws://localhost:3001
//! ```
//!
//! ## As a library
//!
//! ```rust,no_run
//! use pulseboard_client::{ClientConnectionManager, Dashboard, ReconnectPolicy, WsConnector};
//!
//! # async fn run() {
//! let connector = WsConnector::new("ws://localhost:3001");
//! let (handle, mut subscription, _task) =
//!     ClientConnectionManager::spawn(connector, ReconnectPolicy::default());
//! handle.connect();
//!
//! let mut dashboard = Dashboard::new(100);
//! while let Some(operation) = subscription.operations.recv().await {
//!     dashboard.apply(operation);
//! }
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod dashboard;
pub mod data;
pub mod message;

pub use config::{ClientConfig, ReconnectSettings};
pub use connection::{
    ClientConnectionManager, ConnectionHandle, ConnectionState, Connector, ReconnectPolicy,
    SendError, Subscription, Transport, TransportError, TransportEvent, WsConnector,
};
pub use dashboard::{Dashboard, DEFAULT_CATEGORY};
pub use data::{DashboardState, DataPoint, History, MetricStatus};
pub use message::{parse_message, DecodeError, Operation};
