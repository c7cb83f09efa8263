// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Bus endpoint addresses
//!
//! Endpoints are Unix domain socket paths. The `ipc://` prefix used by the
//! middleware configuration is accepted and stripped.

use crate::error::BusError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const IPC_SCHEME: &str = "ipc://";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: PathBuf,
}

impl Endpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FromStr for Endpoint {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| BusError::InvalidEndpoint {
            endpoint: s.to_string(),
            reason,
        };

        let path = match s.strip_prefix(IPC_SCHEME) {
            Some(path) => path,
            None if s.contains("://") => return Err(invalid("only ipc:// endpoints are supported")),
            None => s,
        };

        if path.is_empty() {
            return Err(invalid("socket path is empty"));
        }

        Ok(Self::new(path))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", IPC_SCHEME, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipc_endpoint() {
        let endpoint: Endpoint = "ipc:///tmp/scopes-monitor".parse().unwrap();
        assert_eq!(endpoint.path(), Path::new("/tmp/scopes-monitor"));
        assert_eq!(endpoint.to_string(), "ipc:///tmp/scopes-monitor");
    }

    #[test]
    fn test_parse_bare_path() {
        let endpoint: Endpoint = "/tmp/scopes-monitor2".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("/tmp/scopes-monitor2"));
    }

    #[test]
    fn test_reject_other_schemes() {
        let err = "tcp://127.0.0.1:5555".parse::<Endpoint>().unwrap_err();
        assert!(matches!(err, BusError::InvalidEndpoint { .. }));
        assert!("ipc://".parse::<Endpoint>().is_err());
        assert!("".parse::<Endpoint>().is_err());
    }
}
