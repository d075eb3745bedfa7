use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pulseboard_client::{
    ClientConfig, ClientConnectionManager, ConnectionState, Dashboard, WsConnector,
};
use pulseboard_types::MetricUpdate;

#[derive(Parser, Debug)]
#[command(name = "pulseboard-watch")]
#[command(about = "Subscribe to a pulseboard relay and print the live dashboard")]
struct Args {
    /// Relay WebSocket URL (overrides the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// Path to a config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Points of history kept per metric
    #[arg(long)]
    history: Option<usize>,

    /// Send one probe update once connected (id=value, e.g. "cpu=42.5")
    #[arg(long)]
    probe: Option<String>,
}

/// Client-originated update, echoed back by the relay.
#[derive(Serialize)]
struct ProbeMessage<'a> {
    action: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a MetricUpdate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(history) = args.history {
        config.history_size = history;
    }

    let probe = args.probe.as_deref().map(parse_probe).transpose()?;

    info!(url = %config.url, "Starting subscriber");
    let (handle, mut subscription, task) = ClientConnectionManager::spawn(
        WsConnector::new(config.url.clone()),
        config.reconnect.policy(),
    );
    handle.connect();

    let mut states = handle.watch_state();
    let mut dashboard = Dashboard::new(config.history_size);
    let mut probe = probe;

    loop {
        tokio::select! {
            Some(operation) = subscription.operations.recv() => {
                dashboard.apply(operation);
                render(&dashboard);
            }
            Some(error) = subscription.errors.recv() => {
                warn!(error = %error, "Dropped inbound message");
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                info!(state = %state, attempts = handle.attempts(), "Connection state changed");

                if state == ConnectionState::Connected {
                    if let Some(metric) = probe.take() {
                        let message = ProbeMessage { action: "message", kind: "update", data: &metric };
                        if let Err(e) = handle.send(&message).await {
                            warn!(error = %e, "Probe not sent");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, disconnecting");
                break;
            }
        }
    }

    handle.disconnect();
    drop(handle);
    let _ = task.await;
    Ok(())
}

fn parse_probe(probe: &str) -> Result<MetricUpdate> {
    let (id, value) = probe
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("probe must look like id=value, got {:?}", probe))?;
    let value: f64 = value.trim().parse()?;
    Ok(MetricUpdate::new(id.trim(), value).label(id.trim()))
}

fn render(dashboard: &Dashboard) {
    println!();
    for (category, metrics) in dashboard.grouped() {
        println!("[{}]", category);
        for metric in metrics {
            let trend = dashboard
                .trend_of(&metric.id)
                .map(|t| t.symbol())
                .unwrap_or(" ");
            let status = dashboard
                .status_of(&metric.id)
                .map(|s| s.symbol())
                .unwrap_or("");
            let sparkline: String = dashboard
                .sparkline(&metric.id)
                .iter()
                .map(|level| BARS[*level as usize])
                .collect();
            let label = if metric.label.is_empty() { &metric.id } else { &metric.label };

            println!(
                "  {:<24} {:>12.2} {:<6} {} {:<4} {}",
                label,
                metric.value,
                metric.unit.as_deref().unwrap_or(""),
                trend,
                status,
                sparkline
            );
        }
    }
}

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
