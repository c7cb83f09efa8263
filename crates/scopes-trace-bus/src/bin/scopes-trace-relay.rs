// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use clap::Parser;
use scopes_logging::CliLoggingArgs;
use scopes_trace_bus::{DEFAULT_HIGH_WATER_MARK, Endpoint, Relay, RelayConfig};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

/// Relay every frame between the middleware's monitor endpoint and debugging consumers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint middleware processes publish their traffic to
    #[arg(long, default_value = "ipc:///tmp/scopes-monitor")]
    inbound: Endpoint,

    /// Endpoint monitors subscribe to
    #[arg(long, default_value = "ipc:///tmp/scopes-monitor2")]
    outbound: Endpoint,

    /// Frames queued per peer before further frames for it are dropped
    #[arg(long, default_value_t = DEFAULT_HIGH_WATER_MARK)]
    high_water_mark: usize,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.logging.init("scopes-trace-relay")?;

    let config = RelayConfig::new(args.inbound, args.outbound)
        .with_high_water_mark(args.high_water_mark);
    let relay = Relay::bind(config).context("relay failed to start")?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => info!(operation = "shutdown", signal = "SIGINT", "Received SIGINT, shutting down"),
            _ = sigterm.recv() => info!(operation = "shutdown", signal = "SIGTERM", "Received SIGTERM, shutting down"),
        }
    };

    relay.run_until(shutdown).await?;
    Ok(())
}
