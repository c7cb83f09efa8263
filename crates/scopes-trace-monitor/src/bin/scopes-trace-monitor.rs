// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use clap::Parser;
use scopes_logging::CliLoggingArgs;
use scopes_trace_bus::Endpoint;
use scopes_trace_monitor::{Monitor, SchemaRegistry};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

/// Print every request envelope forwarded by the trace relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay endpoint to subscribe to
    #[arg(long, default_value = "ipc:///tmp/scopes-monitor2")]
    endpoint: Endpoint,

    /// Print the operations with a registered payload schema and exit
    #[arg(long)]
    list_schemas: bool,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let registry = SchemaRegistry::builtin();

    if args.list_schemas {
        let mut stdout = std::io::stdout().lock();
        for operation in registry.operations() {
            if let Some(schema) = registry.resolve(operation) {
                writeln!(stdout, "{:<18} {}", operation, schema.type_name)?;
            }
        }
        return Ok(());
    }

    args.logging.init("scopes-trace-monitor")?;
    info!(
        operation = "monitor_start",
        endpoint = %args.endpoint,
        schemas = registry.len(),
        "Starting trace monitor"
    );

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut monitor = Monitor::new(&registry);
    let mut stdout = std::io::stdout();

    tokio::select! {
        result = monitor.run_forever(&args.endpoint, &mut stdout) => {
            result.context("monitor stopped")?;
        }
        _ = sigint.recv() => info!(operation = "shutdown", signal = "SIGINT", "Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!(operation = "shutdown", signal = "SIGTERM", "Received SIGTERM, shutting down"),
    }

    Ok(())
}
