// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Receive loop that turns bus frames into printed reports

use crate::codec::{decode_envelope, decode_nested_payload};
use crate::error::MonitorError;
use crate::node::DecodedNode;
use crate::render::{INDENT_WIDTH, render};
use crate::schema::SchemaRegistry;
use chrono::NaiveTime;
use scopes_trace_bus::{Endpoint, Subscriber};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Closes every report
pub const SEPARATOR: &str = "==========================================";

/// Wait between attempts to reach an absent relay
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);

pub struct Monitor<'r> {
    registry: &'r SchemaRegistry,
    received: u64,
}

impl<'r> Monitor<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            received: 0,
        }
    }

    /// Messages seen so far, malformed ones included
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Decode one bus message and format its report
    ///
    /// Decode failures are written into the report in place of the part
    /// that could not be decoded; they never abort the caller's loop.
    pub fn report(&mut self, message: &[u8], at: NaiveTime) -> String {
        self.received += 1;
        let sequence = self.received;
        let pad = " ".repeat(INDENT_WIDTH);

        let mut out = format!(
            "{} received {} byte message #{}:\n",
            at.format("%H:%M:%S%.6f"),
            message.len(),
            sequence
        );

        match decode_envelope(message) {
            Err(e) => {
                warn!(operation = "decode_envelope", sequence, error = %e, "Skipping malformed message");
                out.push_str(&format!("{}{}\n", pad, e));
            }
            Ok(envelope) => {
                out.push_str(&format!("{}mode: {}\n", pad, envelope.mode));
                out.push_str(&format!("{}opName: {:?}\n", pad, envelope.operation_name));
                out.push_str(&format!("{}id: {:?}\n", pad, envelope.identity));
                out.push_str(&format!("{}cat: {:?}\n", pad, envelope.category));

                match decode_nested_payload(&envelope, self.registry) {
                    Ok(DecodedNode::FieldSet(fields)) if !fields.is_empty() => {
                        let type_name = self
                            .registry
                            .resolve(&envelope.operation_name)
                            .map(|schema| schema.type_name.as_str())
                            .unwrap_or("FieldSet");
                        out.push_str(&format!("{}inParams as <{}>:\n", pad, type_name));
                        out.push_str(&render(&DecodedNode::FieldSet(fields), 2));
                    }
                    Ok(node) => {
                        if let DecodedNode::Opaque { len } = node {
                            debug!(
                                operation = "decode_nested_payload",
                                op_name = %envelope.operation_name,
                                len,
                                "No schema registered for operation"
                            );
                        }
                        out.push_str(&format!("{}inParams: {}", pad, render(&node, 0)));
                    }
                    Err(e) => {
                        warn!(
                            operation = "decode_nested_payload",
                            sequence,
                            op_name = %envelope.operation_name,
                            error = %e,
                            "Payload does not match its schema"
                        );
                        out.push_str(&format!("{}inParams: {}\n", pad, e));
                    }
                }
            }
        }

        out.push_str(SEPARATOR);
        out.push('\n');
        out
    }

    /// Print a report for every frame `subscriber` receives
    ///
    /// Returns `Ok` once the relay closes the connection.
    pub async fn run<W: Write>(
        &mut self,
        subscriber: &mut Subscriber,
        out: &mut W,
    ) -> Result<(), MonitorError> {
        while let Some(message) = subscriber.recv().await? {
            let report = self.report(&message, chrono::Local::now().time());
            out.write_all(report.as_bytes()).map_err(MonitorError::Output)?;
            out.flush().map_err(MonitorError::Output)?;
        }

        info!(
            operation = "monitor_run",
            endpoint = %subscriber.endpoint(),
            received = self.received,
            "Relay closed the connection"
        );
        Ok(())
    }

    /// Like [`Monitor::run`], reconnecting whenever the relay is absent or goes away
    ///
    /// Only a failure to write reports ends the loop.
    pub async fn run_forever<W: Write>(
        &mut self,
        endpoint: &Endpoint,
        out: &mut W,
    ) -> Result<(), MonitorError> {
        loop {
            match Subscriber::connect(endpoint).await {
                Ok(mut subscriber) => {
                    info!(operation = "monitor_connect", endpoint = %endpoint, "Subscribed to relay");
                    match self.run(&mut subscriber, out).await {
                        Ok(()) => {}
                        Err(MonitorError::Bus(e)) => {
                            warn!(operation = "monitor_run", endpoint = %endpoint, error = %e, "Lost relay connection");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    debug!(operation = "monitor_connect", endpoint = %endpoint, error = %e, "Relay not reachable yet");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}
