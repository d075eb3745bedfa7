//! WebSocket transport built on tokio-tungstenite.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::{Connector, Transport, TransportError, TransportEvent};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Connects to a `ws://` endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let (sink, mut stream) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        // Reads frames on its own task so `recv` is a plain channel read
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.as_str().to_owned()),
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                            .unwrap_or((None, String::new()));
                        let _ = tx.send(TransportEvent::Closed { code, reason });
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = tx.send(TransportEvent::Closed {
                            code: None,
                            reason: e.to_string(),
                        });
                        return;
                    }
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(TransportEvent::Closed {
                code: None,
                reason: "stream ended".to_string(),
            });
        });

        Ok(Box::new(WsTransport {
            sink,
            events: rx,
            reader,
        }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

struct WsTransport {
    sink: WsSink,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed {
                code: None,
                reason: "reader stopped".to_string(),
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!("Close frame not sent: {}", e);
        }
        let _ = self.sink.close().await;
        self.reader.abort();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
