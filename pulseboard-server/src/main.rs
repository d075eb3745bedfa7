use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulseboard_server::{GatewayConfig, Relay, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "pulseboard-relay")]
#[command(about = "Fan metric events out to live dashboard subscribers")]
struct Args {
    /// Path to a config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Records pulled per read
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = RelayConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.gateway = GatewayConfig::WebSocket { listen };
    }
    if let Some(batch_size) = args.batch_size {
        config.consumer.batch_size = batch_size;
    }

    let relay = Relay::from_config(&config).await?;
    let snapshot = relay
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!(
        events = snapshot.events,
        decode_errors = snapshot.decode_errors,
        broadcasts = snapshot.broadcasts,
        deliveries = snapshot.deliveries,
        evictions = snapshot.evictions,
        delivery_failures = snapshot.delivery_failures,
        registry_failures = snapshot.registry_failures,
        "Relay stopped"
    );
    Ok(())
}
