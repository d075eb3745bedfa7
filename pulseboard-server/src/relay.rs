//! Wires a log, a registry and a gateway into a running relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use pulseboard_fanout::{
    Broadcaster, ChannelLog, ConnectionGateway, ConnectionRegistry, ConsumerConfig, EventLog,
    FanoutStats, FanoutStatsSnapshot, InMemoryRegistry, StreamConsumer,
};

use crate::config::{GatewayConfig, RegistryConfig, RelayConfig, SourceConfig};

/// How long the WebSocket endpoint gets to drain after shutdown.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery side of a relay.
pub enum RelayGateway {
    /// Payloads go to an externally managed gateway. Connection lifecycle
    /// events are handled by whoever owns the sockets.
    Remote(Arc<dyn ConnectionGateway>),
    /// Subscribers connect to this process on the given listener.
    #[cfg(feature = "websocket")]
    WebSocket(tokio::net::TcpListener),
}

/// A stream consumer plus, for the WebSocket gateway, the endpoint serving
/// subscribers.
pub struct Relay {
    log: Box<dyn EventLog>,
    registry: Arc<dyn ConnectionRegistry>,
    gateway: RelayGateway,
    consumer: ConsumerConfig,
    stats: Arc<FanoutStats>,
}

impl Relay {
    pub fn new(
        log: Box<dyn EventLog>,
        registry: Arc<dyn ConnectionRegistry>,
        gateway: RelayGateway,
        consumer: ConsumerConfig,
    ) -> Self {
        Self {
            log,
            registry,
            gateway,
            consumer,
            stats: Arc::new(FanoutStats::new()),
        }
    }

    /// Open every backend named in `config`.
    pub async fn from_config(config: &RelayConfig) -> Result<Self> {
        if matches!(config.registry, RegistryConfig::Redis { .. })
            && matches!(config.gateway, GatewayConfig::WebSocket { .. })
        {
            warn!(
                "Shared registry with a local WebSocket gateway: connections owned by other \
                 relays will be evicted as gone"
            );
        }

        let log = open_log(&config.source).await?;
        let registry = open_registry(&config.registry).await?;
        let gateway = open_gateway(&config.gateway).await?;

        Ok(Self::new(
            log,
            registry,
            gateway,
            config.consumer.consumer_config(),
        ))
    }

    pub fn stats(&self) -> Arc<FanoutStats> {
        self.stats.clone()
    }

    /// Address of the WebSocket endpoint, if this relay serves one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.gateway {
            RelayGateway::Remote(_) => None,
            #[cfg(feature = "websocket")]
            RelayGateway::WebSocket(listener) => listener.local_addr().ok(),
        }
    }

    /// Run until `shutdown` resolves or the log ends.
    ///
    /// Returns the final counters.
    pub async fn run<F>(self, shutdown: F) -> Result<FanoutStatsSnapshot>
    where
        F: Future<Output = ()> + Send,
    {
        let Relay {
            log,
            registry,
            gateway,
            consumer,
            stats,
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (gateway, server) = start_gateway(gateway, registry.clone(), &stats, stop_rx.clone())?;

        let broadcaster = Broadcaster::new(registry, gateway).with_stats(stats.clone());
        let mut consumer_task =
            tokio::spawn(StreamConsumer::new(log, broadcaster, consumer).run(stop_rx));

        let finished = tokio::select! {
            _ = shutdown => {
                info!("Shutdown requested");
                None
            }
            joined = &mut consumer_task => Some(joined),
        };

        let _ = stop_tx.send(true);
        let joined = match finished {
            Some(joined) => joined,
            None => consumer_task.await,
        };
        if let Err(e) = joined {
            warn!("Consumer task failed: {}", e);
        }

        if let Some(mut server) = server {
            match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, &mut server).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!("WebSocket endpoint failed: {}", e),
                Ok(Err(e)) => warn!("WebSocket endpoint task failed: {}", e),
                Err(_) => {
                    warn!("WebSocket endpoint did not drain in time");
                    server.abort();
                }
            }
        }

        Ok(stats.snapshot())
    }
}

type ServerTask = tokio::task::JoinHandle<std::io::Result<()>>;

#[cfg_attr(not(feature = "websocket"), allow(unused_variables))]
fn start_gateway(
    gateway: RelayGateway,
    registry: Arc<dyn ConnectionRegistry>,
    stats: &Arc<FanoutStats>,
    mut stop: watch::Receiver<bool>,
) -> Result<(Arc<dyn ConnectionGateway>, Option<ServerTask>)> {
    match gateway {
        RelayGateway::Remote(gateway) => Ok((gateway, None)),
        #[cfg(feature = "websocket")]
        RelayGateway::WebSocket(listener) => {
            use pulseboard_adapters::websocket::WebSocketGateway;
            use pulseboard_fanout::ConnectionLifecycleHandler;

            let endpoint = WebSocketGateway::new();
            let gateway: Arc<dyn ConnectionGateway> = Arc::new(endpoint.clone());
            let lifecycle = ConnectionLifecycleHandler::new(registry, gateway.clone())
                .with_stats(stats.clone());
            let router = endpoint.router(lifecycle);

            info!("Accepting subscribers on {}", listener.local_addr()?);
            let server = tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = stop.wait_for(|stopped| *stopped).await;
                    })
                    .await
            });

            Ok((gateway, Some(server)))
        }
    }
}

async fn open_log(source: &SourceConfig) -> Result<Box<dyn EventLog>> {
    match source {
        SourceConfig::Stdin => Ok(Box::new(ChannelLog::spawn_reader(
            tokio::io::stdin(),
            "stdin",
        ))),
        SourceConfig::Tcp { address } => {
            let stream = tokio::net::TcpStream::connect(address)
                .await
                .with_context(|| format!("Failed to connect to {}", address))?;
            Ok(Box::new(ChannelLog::spawn_reader(stream, address)))
        }
        #[cfg(feature = "kafka")]
        SourceConfig::Kafka {
            brokers,
            group_id,
            topic,
        } => {
            let mut builder = pulseboard_adapters::kafka::KafkaLog::builder();
            if let Some(brokers) = brokers {
                builder = builder.brokers(brokers.as_str());
            }
            if let Some(group_id) = group_id {
                builder = builder.group_id(group_id.as_str());
            }
            if let Some(topic) = topic {
                builder = builder.topic(topic.as_str());
            }
            Ok(Box::new(builder.build()?))
        }
        #[cfg(not(feature = "kafka"))]
        SourceConfig::Kafka { .. } => {
            anyhow::bail!("Kafka source requires the `kafka` feature")
        }
        #[cfg(feature = "nats")]
        SourceConfig::Nats {
            url,
            stream,
            durable,
            credentials_file,
        } => {
            let mut builder = pulseboard_adapters::nats::NatsLog::builder();
            if let Some(url) = url {
                builder = builder.url(url.as_str());
            }
            if let Some(stream) = stream {
                builder = builder.stream(stream.as_str());
            }
            if let Some(durable) = durable {
                builder = builder.durable(durable.as_str());
            }
            if let Some(path) = credentials_file {
                builder = builder.credentials_file(path.as_str());
            }
            Ok(Box::new(builder.build().await?))
        }
        #[cfg(not(feature = "nats"))]
        SourceConfig::Nats { .. } => {
            anyhow::bail!("NATS source requires the `nats` feature")
        }
    }
}

async fn open_registry(registry: &RegistryConfig) -> Result<Arc<dyn ConnectionRegistry>> {
    match registry {
        RegistryConfig::Memory => Ok(Arc::new(InMemoryRegistry::new())),
        #[cfg(feature = "redis")]
        RegistryConfig::Redis { url, key } => {
            use pulseboard_adapters::redis::{RedisRegistry, DEFAULT_KEY};

            let key = key.as_deref().unwrap_or(DEFAULT_KEY);
            Ok(Arc::new(RedisRegistry::connect(url, key).await?))
        }
        #[cfg(not(feature = "redis"))]
        RegistryConfig::Redis { .. } => {
            anyhow::bail!("Redis registry requires the `redis` feature")
        }
    }
}

async fn open_gateway(gateway: &GatewayConfig) -> Result<RelayGateway> {
    match gateway {
        #[cfg(feature = "websocket")]
        GatewayConfig::WebSocket { listen } => {
            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .with_context(|| format!("Failed to bind {}", listen))?;
            Ok(RelayGateway::WebSocket(listener))
        }
        #[cfg(not(feature = "websocket"))]
        GatewayConfig::WebSocket { .. } => {
            anyhow::bail!("WebSocket gateway requires the `websocket` feature")
        }
        #[cfg(feature = "http")]
        GatewayConfig::Http {
            endpoint,
            token,
            timeout_ms,
        } => {
            let mut builder = pulseboard_adapters::http::HttpGateway::builder();
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint.as_str());
            }
            if let Some(token) = token {
                builder = builder.token(token.as_str());
            }
            if let Some(ms) = timeout_ms {
                builder = builder.timeout(Duration::from_millis(*ms));
            }
            Ok(RelayGateway::Remote(Arc::new(builder.build()?)))
        }
        #[cfg(not(feature = "http"))]
        GatewayConfig::Http { .. } => {
            anyhow::bail!("HTTP gateway requires the `http` feature")
        }
    }
}
