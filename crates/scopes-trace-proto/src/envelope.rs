// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! SSZ request envelope published for every middleware invocation

use ssz_derive::{Decode, Encode};

/// Invocation mode of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMode {
    /// Fire-and-forget, no reply expected
    Oneway,
    /// Caller waits for a reply
    Twoway,
}

impl RequestMode {
    pub fn as_u8(self) -> u8 {
        match self {
            RequestMode::Oneway => 0,
            RequestMode::Twoway => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestMode::Oneway => "oneway",
            RequestMode::Twoway => "twoway",
        }
    }
}

impl TryFrom<u8> for RequestMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RequestMode::Oneway),
            1 => Ok(RequestMode::Twoway),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for RequestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request envelope as it travels on the wire
///
/// Strings are carried as UTF-8 byte vectors.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct RequestMessage {
    /// [`RequestMode`] discriminant
    pub mode: u8,
    /// Operation name, e.g. `create_query`
    pub op_name: Vec<u8>,
    /// Identity of the target object
    pub id: Vec<u8>,
    /// Category of the target object
    pub cat: Vec<u8>,
    /// Operation-specific SSZ payload; layout depends on `op_name`
    pub in_params: Option<Vec<u8>>,
}

impl RequestMessage {
    pub fn new(mode: RequestMode, op_name: &str, id: &str, cat: &str) -> Self {
        Self {
            mode: mode.as_u8(),
            op_name: op_name.as_bytes().to_vec(),
            id: id.as_bytes().to_vec(),
            cat: cat.as_bytes().to_vec(),
            in_params: None,
        }
    }

    /// Attach an encoded payload
    pub fn with_in_params(mut self, in_params: impl ssz::Encode) -> Self {
        self.in_params = Some(in_params.as_ssz_bytes());
        self
    }
}
