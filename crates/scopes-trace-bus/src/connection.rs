// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client side of the bus
//!
//! A [`Connection`] is a framed, bidirectional stream to one relay leg.
//! [`Publisher`] and [`Subscriber`] restrict it to the direction a producer
//! or a debugging consumer actually uses.

use crate::endpoint::Endpoint;
use crate::error::BusError;
use crate::frame::{MAX_FRAME_LEN, read_frame, write_frame};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tracing::debug;

pub struct Connection {
    endpoint: Endpoint,
    stream: BufReader<UnixStream>,
}

impl Connection {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, BusError> {
        let stream =
            UnixStream::connect(endpoint.path())
                .await
                .map_err(|source| BusError::Connect {
                    endpoint: endpoint.clone(),
                    source,
                })?;
        debug!(operation = "bus_connect", endpoint = %endpoint, "Connected to relay leg");

        Ok(Self {
            endpoint: endpoint.clone(),
            stream: BufReader::new(stream),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send one frame
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), BusError> {
        if payload.len() > MAX_FRAME_LEN {
            return Err(BusError::FrameTooLarge(payload.len()));
        }
        write_frame(self.stream.get_mut(), payload).await?;
        Ok(())
    }

    /// Wait for the next frame. `None` means the relay closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, BusError> {
        Ok(read_frame(&mut self.stream).await?)
    }
}

/// Producer side: publishes frames into the relay's inbound leg
pub struct Publisher {
    connection: Connection,
}

impl Publisher {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, BusError> {
        Ok(Self {
            connection: Connection::connect(endpoint).await?,
        })
    }

    pub async fn publish(&mut self, payload: &[u8]) -> Result<(), BusError> {
        self.connection.send(payload).await
    }
}

/// Consumer side: receives every frame the relay forwards to its leg
pub struct Subscriber {
    connection: Connection,
}

impl Subscriber {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, BusError> {
        Ok(Self {
            connection: Connection::connect(endpoint).await?,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    /// Block until the next frame arrives. `None` means the relay went away.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, BusError> {
        self.connection.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn test_connect_to_missing_endpoint_fails() {
        let tmp = TempDir::new().unwrap();
        let endpoint = Endpoint::new(tmp.path().join("absent.sock"));
        let err = Subscriber::connect(&endpoint).await.err().unwrap();
        assert!(matches!(err, BusError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_publisher_writes_frames() {
        let tmp = TempDir::new().unwrap();
        let endpoint = Endpoint::new(tmp.path().join("leg.sock"));
        let listener = UnixListener::bind(endpoint.path()).unwrap();

        let mut publisher = Publisher::connect(&endpoint).await.unwrap();
        let (mut server_side, _) = listener.accept().await.unwrap();
        publisher.publish(b"hello").await.unwrap();

        let frame = read_frame(&mut server_side).await.unwrap();
        assert_eq!(frame, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_subscriber_sees_close() {
        let tmp = TempDir::new().unwrap();
        let endpoint = Endpoint::new(tmp.path().join("leg.sock"));
        let listener = UnixListener::bind(endpoint.path()).unwrap();

        let mut subscriber = Subscriber::connect(&endpoint).await.unwrap();
        let (mut server_side, _) = listener.accept().await.unwrap();
        write_frame(&mut server_side, b"last").await.unwrap();
        drop(server_side);

        assert_eq!(subscriber.recv().await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(subscriber.recv().await.unwrap(), None);
    }
}
