// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use clap::Parser;
use scopes_logging::CliLoggingArgs;
use scopes_trace_bus::{Endpoint, Publisher};
use scopes_trace_monitor::{Envelope, encode_envelope};
use scopes_trace_proto::{
    CreateQueryRequest, DictEntry, FinishedReason, FinishedRequest, IdentityRequest, InfoCode,
    InfoRequest, ProxyRef, PushRequest, RequestMode, RunRequest, Value, encode_ssz,
};
use std::time::Duration;
use tracing::{debug, info};

/// Publish sample request envelopes into the trace relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay endpoint producers publish to
    #[arg(long, default_value = "ipc:///tmp/scopes-monitor")]
    endpoint: Endpoint,

    /// Operation name to put in the envelope
    #[arg(long, default_value = "create_query")]
    op: String,

    /// Query string, also used as the text of payloads that carry one
    #[arg(long, default_value = "weather")]
    query: String,

    /// Identity of the target object
    #[arg(long, default_value = "scope-A")]
    identity: String,

    /// Category of the target object
    #[arg(long, default_value = "Scope")]
    category: String,

    /// Number of messages to publish
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Pause between messages
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,

    /// Hex-encoded payload sent instead of the generated one
    #[arg(long, value_name = "HEX")]
    raw: Option<String>,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

/// Build the envelope the middleware would send for `args.op`
fn sample_envelope(args: &Args) -> Result<Envelope> {
    let reply_proxy = || ProxyRef::new("ipc:///tmp/scopes-reply", &args.identity);

    let (mode, payload) = match args.op.as_str() {
        "create_query" => (
            RequestMode::Twoway,
            Some(encode_ssz(&CreateQueryRequest {
                query: args.query.as_bytes().to_vec(),
                hints: vec![
                    DictEntry::new("cardinality", Value::Int(20)),
                    DictEntry::new("locale", Value::text("en_US")),
                ],
                reply_proxy: reply_proxy(),
            })),
        ),
        "run" => (
            RequestMode::Oneway,
            Some(encode_ssz(&RunRequest {
                reply_proxy: reply_proxy(),
            })),
        ),
        "push" => (
            RequestMode::Oneway,
            Some(encode_ssz(&PushRequest {
                result: vec![
                    DictEntry::new("title", Value::text(&args.query)),
                    DictEntry::new("uri", Value::text("scope://sample")),
                ],
            })),
        ),
        "finished" => (
            RequestMode::Oneway,
            Some(encode_ssz(&FinishedRequest::new(FinishedReason::Finished, None))),
        ),
        "info" => (
            RequestMode::Oneway,
            Some(encode_ssz(&InfoRequest::new(InfoCode::Unknown, &args.query))),
        ),
        "get_metadata" | "locate" | "is_scope_running" => (
            RequestMode::Twoway,
            Some(encode_ssz(&IdentityRequest::new(&args.identity))),
        ),
        "ping" | "list" => (RequestMode::Twoway, None),
        _ => (RequestMode::Twoway, Some(args.query.as_bytes().to_vec())),
    };

    let payload = match &args.raw {
        Some(raw) => Some(hex::decode(raw).context("--raw is not valid hex")?),
        None => payload,
    };

    let envelope = Envelope::new(mode, &args.op).with_target(&args.identity, &args.category);
    Ok(match payload {
        Some(payload) => envelope.with_payload(payload),
        None => envelope,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let message = encode_envelope(&sample_envelope(&args)?);
    args.logging.init("scopes-trace-publish")?;

    let mut publisher = Publisher::connect(&args.endpoint)
        .await
        .context("failed to reach the trace relay")?;

    for n in 1..=args.count {
        publisher.publish(&message).await?;
        debug!(operation = "publish", n, bytes = message.len(), "Published message");
        if n < args.count {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    info!(
        operation = "publish",
        op_name = %args.op,
        count = args.count,
        endpoint = %args.endpoint,
        "Done publishing"
    );
    Ok(())
}
