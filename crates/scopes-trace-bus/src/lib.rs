// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Framed publish/subscribe over Unix domain sockets for scopes traffic
//!
//! Middleware processes publish a copy of every request they send to the
//! relay's inbound endpoint. The [`Relay`] forwards each frame, unmodified,
//! to every peer connected to the outbound endpoint (and frames travelling
//! the other way back to the inbound peers). Debugging tools such as the
//! trace monitor attach to the outbound endpoint with a [`Subscriber`].
//!
//! # Example
//!
//! ```no_run
//! use scopes_trace_bus::{Publisher, Relay, RelayConfig, Subscriber};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::new("/tmp/trace-in".parse()?, "/tmp/trace-out".parse()?);
//!     let relay = Relay::bind(config)?;
//!     tokio::spawn(relay.run());
//!
//!     let mut subscriber = Subscriber::connect(&"/tmp/trace-out".parse()?).await?;
//!     let mut publisher = Publisher::connect(&"/tmp/trace-in".parse()?).await?;
//!     publisher.publish(b"ping").await?;
//!     let frame = subscriber.recv().await?;
//!     assert_eq!(frame.as_deref(), Some(&b"ping"[..]));
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod relay;

pub use connection::{Connection, Publisher, Subscriber};
pub use endpoint::Endpoint;
pub use error::BusError;
pub use relay::{DEFAULT_HIGH_WATER_MARK, Relay, RelayConfig};
