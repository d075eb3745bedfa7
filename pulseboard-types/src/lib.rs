//! # pulseboard-types
//!
//! Shared data model for the pulseboard fan-out pipeline. Both the relay
//! (stream consumer, broadcaster, connection registry) and the subscriber
//! (connection manager, dashboard merger) speak in these types.
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde. Field names match the wire
//!   format used by producers and subscribers (`connectionId`, `batch-update`, ...).
//!
//! ## Example
//!
//! ```rust
//! use pulseboard_types::{Event, MetricUpdate};
//!
//! let event = Event::new("cpu", "CPU Usage", 42.5, "%", "2024-01-01T00:00:00Z");
//! let update = MetricUpdate::from(event);
//! let metric = update.into_metric("2024-01-01T00:00:01Z");
//!
//! // The event carried its own timestamp, so the fallback is not used.
//! assert_eq!(metric.timestamp, "2024-01-01T00:00:00Z");
//! ```

mod connection;
mod envelope;
mod event;
mod metric;

pub use connection::*;
pub use envelope::*;
pub use event::*;
pub use metric::*;

/// Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
