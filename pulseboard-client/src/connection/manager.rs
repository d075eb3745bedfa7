//! Subscriber connection manager.
//!
//! One task owns the transport, the pending handshake and the retry timer, and
//! serializes every transition through a single `select!` loop. Callers talk
//! to it through a cloneable [`ConnectionHandle`]; inbound messages come out of
//! a [`Subscription`].
//!
//! ```text
//!   DISCONNECTED --connect--> CONNECTING --ok--> CONNECTED
//!        ^                        |                  |
//!        +----- failure ----------+------ close -----+
//!        |  (retry scheduled with backoff)
//!   force_reconnect: any state --> CONNECTING (timer cancelled, transport closed)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use super::{ConnectionState, Connector, ReconnectPolicy, Transport, TransportError, TransportEvent};
use crate::message::{parse_message, DecodeError, Operation};

type Handshake =
    Pin<Box<dyn Future<Output = Result<Box<dyn Transport>, TransportError>> + Send>>;

/// Why a send did not go out.
#[derive(Debug, Error)]
pub enum SendError {
    /// No open transport. A connection attempt has been started.
    #[error("not connected")]
    NotConnected,

    #[error("failed to serialize message: {0}")]
    Serialize(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The manager task has exited.
    #[error("connection manager stopped")]
    Stopped,
}

enum Command {
    Connect,
    ForceReconnect,
    Disconnect,
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
}

/// Control surface of a running [`ClientConnectionManager`].
///
/// Dropping every handle shuts the manager down.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    attempts: Arc<AtomicU32>,
}

impl ConnectionHandle {
    /// Connect unless already connected or connecting.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close any open transport and connect again right away, cancelling a
    /// pending retry and resetting the attempt count.
    pub fn force_reconnect(&self) {
        let _ = self.commands.send(Command::ForceReconnect);
    }

    /// Close the transport and stop retrying until the next `connect`,
    /// `send` or `force_reconnect`.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Serialize `message` as JSON and send it.
    ///
    /// Fails with [`SendError::NotConnected`] unless connected, and in that
    /// case also starts a connection attempt.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), SendError> {
        let text =
            serde_json::to_string(message).map_err(|e| SendError::Serialize(e.to_string()))?;
        self.send_text(text).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SendError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                text: text.into(),
                reply,
            })
            .map_err(|_| SendError::Stopped)?;
        response.await.map_err(|_| SendError::Stopped)?
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Consecutive retries scheduled since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Inbound side of a connection: decoded operations and decode failures.
#[derive(Debug)]
pub struct Subscription {
    pub operations: mpsc::UnboundedReceiver<Operation>,
    pub errors: mpsc::UnboundedReceiver<DecodeError>,
}

/// Keeps one subscriber connection alive, reconnecting with backoff.
pub struct ClientConnectionManager<C> {
    connector: Arc<C>,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    attempts: Arc<AtomicU32>,
    transport: Option<Box<dyn Transport>>,
    handshake: Option<Handshake>,
    retry: Option<Pin<Box<Sleep>>>,
    /// Set by a manual disconnect; suppresses retries.
    suspended: bool,
    operations: mpsc::UnboundedSender<Operation>,
    errors: mpsc::UnboundedSender<DecodeError>,
}

impl<C: Connector> ClientConnectionManager<C> {
    /// Start the manager on a background task. It stays disconnected until
    /// the first [`ConnectionHandle::connect`].
    pub fn spawn(
        connector: C,
        policy: ReconnectPolicy,
    ) -> (ConnectionHandle, Subscription, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (operations_tx, operations_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicU32::new(0));

        let manager = Self {
            connector: Arc::new(connector),
            policy,
            state: state_tx,
            attempts: attempts.clone(),
            transport: None,
            handshake: None,
            retry: None,
            suspended: false,
            operations: operations_tx,
            errors: errors_tx,
        };
        let task = tokio::spawn(manager.run(command_rx));

        let handle = ConnectionHandle {
            commands: command_tx,
            state: state_rx,
            attempts,
        };
        let subscription = Subscription {
            operations: operations_rx,
            errors: errors_rx,
        };
        (handle, subscription, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                result = next_handshake(&mut self.handshake) => self.on_handshake(result),
                event = next_event(&mut self.transport) => self.on_event(event),
                () = next_retry(&mut self.retry) => {
                    self.retry = None;
                    self.start_connect();
                }
            }
        }

        self.close_transport().await;
        debug!("Connection manager for {} stopped", self.connector.endpoint());
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                self.suspended = false;
                if self.transport.is_none() {
                    self.start_connect();
                }
            }
            Command::ForceReconnect => {
                info!("Forcing reconnect to {}", self.connector.endpoint());
                self.suspended = false;
                self.retry = None;
                self.handshake = None;
                self.attempts.store(0, Ordering::SeqCst);
                self.close_transport().await;
                self.start_connect();
            }
            Command::Disconnect => {
                info!("Disconnecting from {}", self.connector.endpoint());
                self.suspended = true;
                self.retry = None;
                self.handshake = None;
                self.close_transport().await;
                self.set_state(ConnectionState::Disconnected);
            }
            Command::Send { text, reply } => {
                let result = match self.transport.as_mut() {
                    Some(transport) => transport.send(text).await.map_err(SendError::from),
                    None => {
                        warn!("Cannot send message, not connected");
                        self.suspended = false;
                        self.start_connect();
                        Err(SendError::NotConnected)
                    }
                };
                let _ = reply.send(result);
            }
        }
    }

    /// Begin a handshake unless one is already in flight.
    fn start_connect(&mut self) {
        if self.handshake.is_some() {
            return;
        }
        self.retry = None;

        info!("Connecting to {}", self.connector.endpoint());
        let connector = self.connector.clone();
        self.handshake = Some(Box::pin(async move { connector.connect().await }));
        self.set_state(ConnectionState::Connecting);
    }

    fn on_handshake(&mut self, result: Result<Box<dyn Transport>, TransportError>) {
        self.handshake = None;
        match result {
            Ok(transport) => {
                info!("Connected to {}", self.connector.endpoint());
                self.transport = Some(transport);
                self.attempts.store(0, Ordering::SeqCst);
                self.set_state(ConnectionState::Connected);
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", self.connector.endpoint(), e);
                self.set_state(ConnectionState::Disconnected);
                self.schedule_retry();
            }
        }
    }

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.dispatch(&text),
            TransportEvent::Closed { code, reason } => {
                info!(
                    "Connection to {} closed, code: {:?}, reason: {:?}",
                    self.connector.endpoint(),
                    code,
                    reason
                );
                // Every close is retried, whatever the code
                self.transport = None;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_retry();
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match parse_message(text) {
            Ok(operation) => {
                debug!("Received {} message", operation.kind());
                let _ = self.operations.send(operation);
            }
            Err(e) => {
                warn!("Dropping malformed message: {}", e);
                let _ = self.errors.send(e);
            }
        }
    }

    fn schedule_retry(&mut self) {
        if self.suspended {
            return;
        }

        let (attempts, delay) = self.policy.next(self.attempts.load(Ordering::SeqCst));
        self.attempts.store(attempts, Ordering::SeqCst);
        if attempts == 0 {
            warn!(
                "Maximum reconnection attempts reached, retrying in {}ms",
                delay.as_millis()
            );
        } else {
            info!(
                "Reconnecting in {}ms ({}/{})",
                delay.as_millis(),
                attempts,
                self.policy.max_attempts
            );
        }
        self.retry = Some(Box::pin(tokio::time::sleep(delay)));
    }

    async fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            self.set_state(ConnectionState::Closing);
            transport.close().await;
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

async fn next_handshake(
    handshake: &mut Option<Handshake>,
) -> Result<Box<dyn Transport>, TransportError> {
    match handshake {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

async fn next_event(transport: &mut Option<Box<dyn Transport>>) -> TransportEvent {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
