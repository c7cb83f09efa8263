// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scopes trace monitor
//!
//! Decodes the request envelopes forwarded by the trace relay and prints a
//! human-readable report for each one. Payloads of instrumented operations
//! are decoded against the [`SchemaRegistry`]; anything else is shown as an
//! opaque byte count.

pub mod codec;
pub mod error;
pub mod monitor;
pub mod node;
pub mod render;
pub mod schema;

pub use codec::{
    Envelope, decode_envelope, decode_nested_payload, decode_with_schema, encode_envelope,
    encode_with_schema,
};
pub use error::{MonitorError, ShapeError, TraceError};
pub use monitor::{Monitor, SEPARATOR};
pub use node::{DecodedNode, Scalar};
pub use render::render;
pub use schema::{Field, Schema, SchemaEntry, SchemaRegistry, Shape, field};
