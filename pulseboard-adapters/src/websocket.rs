//! WebSocket endpoint that doubles as a [`ConnectionGateway`].
//!
//! Each upgraded socket gets a fresh uuid connection id and a bounded outbound
//! queue drained by a writer task. A post to a socket whose queue is full fails
//! as transient; the socket stays registered and later posts may succeed. The socket's open, message and close events are
//! fed to a [`ConnectionLifecycleHandler`]; broadcasts reach the socket through
//! [`ConnectionGateway::post`]. A post to an id with no live socket is reported
//! as gone, so pair this gateway with a registry local to the process.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulseboard_adapters::websocket::WebSocketGateway;
//! use pulseboard_fanout::{ConnectionLifecycleHandler, InMemoryRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(InMemoryRegistry::new());
//!     let gateway = WebSocketGateway::new();
//!     let lifecycle = ConnectionLifecycleHandler::new(registry, Arc::new(gateway.clone()));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//!     axum::serve(listener, gateway.router(lifecycle)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use pulseboard_fanout::{ConnectionGateway, ConnectionLifecycleHandler, DeliveryError};
use pulseboard_types::ConnectionId;

/// Payloads queued per socket before posts start failing.
pub const PEER_QUEUE_CAPACITY: usize = 256;

/// Live sockets keyed by connection id.
#[derive(Debug, Clone, Default)]
pub struct WebSocketGateway {
    peers: Arc<DashMap<ConnectionId, mpsc::Sender<Vec<u8>>>>,
}

#[derive(Clone)]
struct SocketState {
    gateway: WebSocketGateway,
    lifecycle: ConnectionLifecycleHandler,
}

impl WebSocketGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sockets currently attached.
    pub fn connected(&self) -> usize {
        self.peers.len()
    }

    /// Router serving the WebSocket upgrade on `/`.
    pub fn router(&self, lifecycle: ConnectionLifecycleHandler) -> Router {
        Router::new()
            .route("/", get(websocket_handler))
            .with_state(SocketState {
                gateway: self.clone(),
                lifecycle,
            })
    }

    fn attach(&self, connection_id: ConnectionId) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(PEER_QUEUE_CAPACITY);
        self.peers.insert(connection_id, tx);
        rx
    }

    fn detach(&self, connection_id: &ConnectionId) {
        self.peers.remove(connection_id);
    }
}

#[async_trait]
impl ConnectionGateway for WebSocketGateway {
    async fn post(&self, connection_id: &ConnectionId, payload: &[u8]) -> Result<(), DeliveryError> {
        // Clone the sender so no map guard is held past this line
        let sender = self.peers.get(connection_id).map(|entry| entry.value().clone());
        let Some(tx) = sender else {
            return Err(DeliveryError::Gone(connection_id.clone()));
        };

        match tx.try_send(payload.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(DeliveryError::transient(connection_id, "outbound queue full"))
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Gone(connection_id.clone())),
        }
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<SocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SocketState) {
    let connection_id = ConnectionId::new(Uuid::new_v4().to_string());
    let (mut sender, mut receiver) = socket.split();

    // Attach before registering so an early broadcast does not evict us
    let mut outbound = state.gateway.attach(connection_id.clone());

    if state.lifecycle.on_open(connection_id.clone()).await.is_err() {
        state.gateway.detach(&connection_id);
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let writer_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            let text = String::from_utf8_lossy(&payload).into_owned();
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        debug!("Writer task ended for connection {}", writer_id);
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let _ = state.lifecycle.on_message(&connection_id, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error on connection {}: {}", connection_id, e);
                break;
            }
        }
    }

    state.gateway.detach(&connection_id);
    writer.abort();
    let _ = state.lifecycle.on_close(&connection_id).await;
}
