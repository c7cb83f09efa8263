// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use scopes_trace_bus::BusError;
use thiserror::Error;

/// A value did not match its schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct ShapeError {
    /// Field path from the payload root, e.g. `hints[1].value`
    pub path: String,
    pub reason: String,
}

impl ShapeError {
    pub fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
            reason: reason.into(),
        }
    }
}

/// Per-message decode failures; never fatal to the monitor loop
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("MalformedEnvelope: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("PayloadDecodeError: {operation} payload is not a valid {type_name} ({source})")]
    PayloadDecode {
        operation: String,
        type_name: String,
        source: ShapeError,
    },
}

/// Failures that stop [`crate::Monitor::run`]
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("failed to write report: {0}")]
    Output(#[source] std::io::Error),
}
