//! Resilient subscriber connection.

mod backoff;
mod manager;
mod state;
mod transport;
mod ws;

pub use backoff::ReconnectPolicy;
pub use manager::{ClientConnectionManager, ConnectionHandle, SendError, Subscription};
pub use state::ConnectionState;
pub use transport::{Connector, Transport, TransportError, TransportEvent};
pub use ws::WsConnector;
