//! Subscriber configuration.
//!
//! Settings are read from an optional TOML (or any format the `config` crate
//! recognizes by extension) file, then overridden by `PULSEBOARD_*`
//! environment variables. Nested keys use a double underscore:
//!
//! ```toml
//! url = "ws://localhost:3001"
//! history_size = 100
//!
//! [reconnect]
//! base_delay_ms = 2000
//! growth_factor = 1.5
//! max_delay_ms = 30000
//! max_attempts = 10
//! cooldown_ms = 60000
//! ```
//!
//! ```bash
//! PULSEBOARD_URL=ws://relay:3001 PULSEBOARD_RECONNECT__MAX_ATTEMPTS=5 pulseboard-watch
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::connection::ReconnectPolicy;
use crate::data::DEFAULT_HISTORY_SIZE;

const ENV_PREFIX: &str = "PULSEBOARD";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the relay.
    pub url: String,
    pub reconnect: ReconnectSettings,
    /// Points kept per metric for trends and sparklines.
    pub history_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001".to_string(),
            reconnect: ReconnectSettings::default(),
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

/// Reconnect tuning, in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub growth_factor: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub cooldown_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            base_delay_ms: policy.base_delay.as_millis() as u64,
            growth_factor: policy.growth_factor,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            max_attempts: policy.max_attempts,
            cooldown_ms: policy.cooldown.as_millis() as u64,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            growth_factor: self.growth_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }
}

impl ClientConfig {
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
