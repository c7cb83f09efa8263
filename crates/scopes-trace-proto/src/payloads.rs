// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Typed `inParams` payloads of the instrumented operations
//!
//! Field order is part of the wire format. The monitor's schema table mirrors
//! these definitions field by field; keep both in sync when adding fields.

use ssz_derive::{Decode, Encode};

/// Endpoint and identity of a remote object
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ProxyRef {
    pub endpoint: Vec<u8>,
    pub identity: Vec<u8>,
}

impl ProxyRef {
    pub fn new(endpoint: &str, identity: &str) -> Self {
        Self {
            endpoint: endpoint.as_bytes().to_vec(),
            identity: identity.as_bytes().to_vec(),
        }
    }
}

/// Value stored in a hints or result dictionary
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
#[ssz(enum_behaviour = "union")]
pub enum Value {
    Bool(bool),
    Int(u64),
    Text(Vec<u8>),
    TextList(Vec<Vec<u8>>),
}

impl Value {
    pub fn text(value: &str) -> Self {
        Value::Text(value.as_bytes().to_vec())
    }
}

/// One `key -> value` pair of a dictionary
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DictEntry {
    pub key: Vec<u8>,
    pub value: Value,
}

impl DictEntry {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
            value,
        }
    }
}

/// `create_query`: ask a scope to start a query
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CreateQueryRequest {
    pub query: Vec<u8>,
    pub hints: Vec<DictEntry>,
    pub reply_proxy: ProxyRef,
}

/// `run`: start a previously created query
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RunRequest {
    pub reply_proxy: ProxyRef,
}

/// `push`: deliver one result to a reply object
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct PushRequest {
    pub result: Vec<DictEntry>,
}

/// Why a query finished
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishedReason {
    Finished,
    Cancelled,
    Error,
}

impl FinishedReason {
    /// Wire labels, indexed by discriminant
    pub const LABELS: &'static [&'static str] = &["FINISHED", "CANCELLED", "ERROR"];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// `finished`: a query completed, was cancelled or failed
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct FinishedRequest {
    /// [`FinishedReason`] discriminant
    pub reason: u8,
    /// Only set when `reason` is `Error`
    pub error: Option<Vec<u8>>,
}

impl FinishedRequest {
    pub fn new(reason: FinishedReason, error: Option<&str>) -> Self {
        Self {
            reason: reason.as_u8(),
            error: error.map(|e| e.as_bytes().to_vec()),
        }
    }
}

/// Informational status attached to a query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoCode {
    NoInternet,
    PoorInternet,
    NoLocationData,
    InaccurateLocationData,
    ResultsIncomplete,
    DefaultSettingsUsed,
    SettingsProblem,
    Unknown,
}

impl InfoCode {
    /// Wire labels, indexed by discriminant
    pub const LABELS: &'static [&'static str] = &[
        "NO_INTERNET",
        "POOR_INTERNET",
        "NO_LOCATION_DATA",
        "INACCURATE_LOCATION_DATA",
        "RESULTS_INCOMPLETE",
        "DEFAULT_SETTINGS_USED",
        "SETTINGS_PROBLEM",
        "UNKNOWN",
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// `info`: status information for the reply object
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct InfoRequest {
    /// [`InfoCode`] discriminant
    pub code: u8,
    pub message: Vec<u8>,
}

impl InfoRequest {
    pub fn new(code: InfoCode, message: &str) -> Self {
        Self {
            code: code.as_u8(),
            message: message.as_bytes().to_vec(),
        }
    }
}

/// Registry lookups by scope identity (`get_metadata`, `locate`, `is_scope_running`)
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct IdentityRequest {
    pub identity: Vec<u8>,
}

impl IdentityRequest {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.as_bytes().to_vec(),
        }
    }
}
