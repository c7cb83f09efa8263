// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scopes IPC wire messages
//!
//! This crate defines the request envelope every middleware RPC is wrapped in
//! and the typed `inParams` payloads of the operations the trace monitor knows
//! how to decode. Everything is serialized with SSZ.
//!
//! The envelope is self-contained; its nested payload is a plain byte list
//! whose layout depends on the operation name. Producers encode payloads with
//! the types in [`payloads`] and the monitor decodes them against a schema
//! table keyed by operation name.

pub mod envelope;
pub mod payloads;

// Re-export key types
pub use envelope::{RequestMessage, RequestMode};
pub use payloads::{
    CreateQueryRequest, DictEntry, FinishedReason, FinishedRequest, IdentityRequest, InfoCode,
    InfoRequest, ProxyRef, PushRequest, RunRequest, Value,
};

// SSZ encoding/decoding functions for trace communication
pub fn encode_ssz(data: &impl ssz::Encode) -> Vec<u8> {
    data.as_ssz_bytes()
}

pub fn decode_ssz<T: ssz::Decode>(data: &[u8]) -> Result<T, ssz::DecodeError> {
    T::from_ssz_bytes(data)
}
