//! Relay configuration.
//!
//! Loaded from an optional file, then `PULSEBOARD_RELAY_*` environment
//! variables (`__` separates nested keys). Every backend is selected by a
//! `kind` tag:
//!
//! ```toml
//! [source]
//! kind = "kafka"
//! brokers = "localhost:9092"
//! topic = "dashboard-metrics"
//!
//! [consumer]
//! batch_size = 100
//! max_wait_ms = 1000
//!
//! [registry]
//! kind = "memory"
//!
//! [gateway]
//! kind = "websocket"
//! listen = "0.0.0.0:3001"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use pulseboard_fanout::ConsumerConfig;
use serde::Deserialize;

const ENV_PREFIX: &str = "PULSEBOARD_RELAY";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub source: SourceConfig,
    pub consumer: ConsumerSettings,
    pub registry: RegistryConfig,
    pub gateway: GatewayConfig,
}

/// Where events are read from. Unset fields fall back to the backend's defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Newline-delimited JSON on standard input.
    #[default]
    Stdin,
    /// Newline-delimited JSON from a TCP peer.
    Tcp { address: String },
    Kafka {
        #[serde(default)]
        brokers: Option<String>,
        #[serde(default)]
        group_id: Option<String>,
        #[serde(default)]
        topic: Option<String>,
    },
    Nats {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        stream: Option<String>,
        #[serde(default)]
        durable: Option<String>,
        #[serde(default)]
        credentials_file: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub batch_size: usize,
    pub max_wait_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        let defaults = ConsumerConfig::default();
        Self {
            batch_size: defaults.batch_size,
            max_wait_ms: defaults.max_wait.as_millis() as u64,
            retry_interval_ms: defaults.retry_interval.as_millis() as u64,
        }
    }
}

impl ConsumerSettings {
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            batch_size: self.batch_size.max(1),
            max_wait: Duration::from_millis(self.max_wait_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

/// Connection directory backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RegistryConfig {
    #[default]
    Memory,
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
        #[serde(default)]
        key: Option<String>,
    },
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// How payloads reach subscriber connections.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GatewayConfig {
    /// Accept subscribers on a local WebSocket endpoint.
    WebSocket {
        #[serde(default = "default_listen")]
        listen: String,
    },
    /// Post to an external connection management API.
    Http {
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig::WebSocket {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:3001".to_string()
}

impl RelayConfig {
    /// Load from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_to_stdin_memory_websocket() {
        let config = RelayConfig::load_with_prefix(None, "PULSEBOARD_RELAY_TEST_EMPTY").unwrap();

        assert_eq!(config.source, SourceConfig::Stdin);
        assert_eq!(config.registry, RegistryConfig::Memory);
        assert_eq!(
            config.gateway,
            GatewayConfig::WebSocket {
                listen: "0.0.0.0:3001".to_string()
            }
        );

        let consumer = config.consumer.consumer_config();
        assert_eq!(consumer.batch_size, 100);
        assert_eq!(consumer.max_wait, Duration::from_secs(1));
        assert_eq!(consumer.retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn reads_tagged_backends() {
        let file = toml_file(
            r#"
[source]
kind = "kafka"
brokers = "kafka-1:9092,kafka-2:9092"

[consumer]
batch_size = 10
max_wait_ms = 250

[registry]
kind = "redis"
key = "relay:connections"

[gateway]
kind = "http"
endpoint = "https://api.example.com/prod"
timeout_ms = 2000
"#,
        );

        let config = tokio_test::assert_ok!(RelayConfig::load_with_prefix(
            Some(file.path()),
            "PULSEBOARD_RELAY_TEST_FILE"
        ));

        assert_eq!(
            config.source,
            SourceConfig::Kafka {
                brokers: Some("kafka-1:9092,kafka-2:9092".to_string()),
                group_id: None,
                topic: None,
            }
        );
        assert_eq!(config.consumer.consumer_config().batch_size, 10);
        assert_eq!(
            config.consumer.consumer_config().max_wait,
            Duration::from_millis(250)
        );
        assert_eq!(
            config.registry,
            RegistryConfig::Redis {
                url: "redis://127.0.0.1:6379".to_string(),
                key: Some("relay:connections".to_string()),
            }
        );
        assert_eq!(
            config.gateway,
            GatewayConfig::Http {
                endpoint: Some("https://api.example.com/prod".to_string()),
                token: None,
                timeout_ms: Some(2000),
            }
        );
    }

    #[test]
    fn environment_overrides_file() {
        let file = toml_file("[consumer]\nbatch_size = 10\n");
        std::env::set_var("PULSEBOARD_RELAY_TEST_ENV_CONSUMER__BATCH_SIZE", "25");

        let config =
            RelayConfig::load_with_prefix(Some(file.path()), "PULSEBOARD_RELAY_TEST_ENV").unwrap();
        assert_eq!(config.consumer.batch_size, 25);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let settings = ConsumerSettings {
            batch_size: 0,
            ..ConsumerSettings::default()
        };
        assert_eq!(settings.consumer_config().batch_size, 1);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let file = toml_file("[source]\nkind = \"carrier-pigeon\"\n");
        tokio_test::assert_err!(RelayConfig::load_with_prefix(
            Some(file.path()),
            "PULSEBOARD_RELAY_TEST_BAD"
        ));
    }
}
