// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Bidirectional relay between two bus legs
//!
//! The relay binds an inbound ("aggregator") and an outbound ("sender")
//! endpoint. Any number of peers may connect to either leg. A single loop
//! waits on both legs at once and forwards every frame read from a peer of
//! one leg, unmodified, to all peers of the other leg.
//!
//! Each peer gets its own bounded queue. A peer that falls `high_water_mark`
//! frames behind loses further frames until it catches up; the relay never
//! blocks on a slow consumer and never retries.

use crate::endpoint::Endpoint;
use crate::error::BusError;
use crate::frame::{read_frame, write_frame};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Per-peer queue limit, matching the transport's usual default
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub inbound: Endpoint,
    pub outbound: Endpoint,
    pub high_water_mark: usize,
}

impl RelayConfig {
    pub fn new(inbound: Endpoint, outbound: Endpoint) -> Self {
        Self {
            inbound,
            outbound,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }

    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark.max(1);
        self
    }
}

type Frame = Arc<[u8]>;

struct Peer {
    id: String,
    tx: mpsc::Sender<Frame>,
    dropped: u64,
}

/// One side of the relay: its listener, connected peers and the frames they sent
struct Leg {
    name: &'static str,
    endpoint: Endpoint,
    listener: UnixListener,
    peers: Vec<Peer>,
    frames_tx: mpsc::Sender<Vec<u8>>,
    frames_rx: mpsc::Receiver<Vec<u8>>,
}

impl Leg {
    fn bind(name: &'static str, endpoint: &Endpoint, queue: usize) -> Result<Self, BusError> {
        let listener = bind_endpoint(endpoint)?;
        info!(operation = "relay_bind", leg = name, endpoint = %endpoint, "Relay leg bound");

        let (frames_tx, frames_rx) = mpsc::channel(queue);
        Ok(Self {
            name,
            endpoint: endpoint.clone(),
            listener,
            peers: Vec::new(),
            frames_tx,
            frames_rx,
        })
    }

    fn attach(&mut self, stream: UnixStream, high_water_mark: usize, tasks: &mut JoinSet<()>) {
        let id = scopes_logging::peer_id();
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::channel::<Frame>(high_water_mark);
        // Dropped by the reader when the peer goes away; stops the writer too.
        let (reader_done, mut peer_gone) = oneshot::channel::<()>();

        let frames_tx = self.frames_tx.clone();
        let leg = self.name;
        let reader_id = id.clone();
        tasks.spawn(async move {
            let _reader_done = reader_done;
            let mut reader = BufReader::new(read_half);
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        if frames_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(operation = "relay_peer_closed", leg, peer = %reader_id, "Peer disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(operation = "relay_peer_read", leg, peer = %reader_id, error = %e, "Dropping peer after read error");
                        break;
                    }
                }
            }
        });

        let writer_id = id.clone();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut peer_gone => break,
                    frame = rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = write_frame(&mut write_half, &frame).await {
                            debug!(operation = "relay_peer_write", leg, peer = %writer_id, error = %e, "Peer no longer writable");
                            break;
                        }
                    }
                }
            }
        });

        info!(operation = "relay_accept", leg = self.name, peer = %id, peers = self.peers.len() + 1, "Peer connected");
        self.peers.push(Peer { id, tx, dropped: 0 });
    }

    /// Forget peers whose writer has finished.
    fn prune(&mut self) {
        let leg = self.name;
        self.peers.retain(|peer| {
            let closed = peer.tx.is_closed();
            if closed {
                debug!(operation = "relay_detach", leg, peer = %peer.id, dropped = peer.dropped, "Removing disconnected peer");
            }
            !closed
        });
    }

    /// Queue `frame` for every peer of this leg.
    fn broadcast(&mut self, frame: Frame) {
        let leg = self.name;
        self.peers.retain_mut(|peer| match peer.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                peer.dropped += 1;
                debug!(operation = "relay_drop", leg, peer = %peer.id, dropped = peer.dropped, "Peer above high-water mark, frame dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(operation = "relay_detach", leg, peer = %peer.id, dropped = peer.dropped, "Removing disconnected peer");
                false
            }
        });
    }
}

impl Drop for Leg {
    fn drop(&mut self) {
        // Clean up the socket file when the leg is dropped
        if self.endpoint.path().exists() {
            let _ = std::fs::remove_file(self.endpoint.path());
        }
    }
}

/// Bind a listener, refusing endpoints another live process is serving.
fn bind_endpoint(endpoint: &Endpoint) -> Result<UnixListener, BusError> {
    let path = endpoint.path();
    let bind_error = |source| BusError::Bind {
        endpoint: endpoint.clone(),
        source,
    };

    if path.exists() {
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            return Err(bind_error(io::Error::new(
                io::ErrorKind::AddrInUse,
                "another process is listening on this endpoint",
            )));
        }
        debug!(operation = "relay_remove_stale_socket", endpoint = %endpoint, "Removing stale socket file");
        std::fs::remove_file(path).map_err(bind_error)?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(bind_error)?;
    }

    UnixListener::bind(path).map_err(bind_error)
}

/// The relay process state: both legs plus the peer I/O tasks
pub struct Relay {
    inbound: Leg,
    outbound: Leg,
    high_water_mark: usize,
    tasks: JoinSet<()>,
}

impl Relay {
    /// Bind both endpoints. Must be called from within a tokio runtime.
    pub fn bind(config: RelayConfig) -> Result<Self, BusError> {
        if config.inbound == config.outbound {
            return Err(BusError::SameEndpoint(config.inbound));
        }

        let high_water_mark = config.high_water_mark.max(1);
        let inbound = Leg::bind("inbound", &config.inbound, high_water_mark)?;
        let outbound = Leg::bind("outbound", &config.outbound, high_water_mark)?;

        Ok(Self {
            inbound,
            outbound,
            high_water_mark,
            tasks: JoinSet::new(),
        })
    }

    pub fn inbound(&self) -> &Endpoint {
        &self.inbound.endpoint
    }

    pub fn outbound(&self) -> &Endpoint {
        &self.outbound.endpoint
    }

    /// Forward traffic forever.
    pub async fn run(self) -> Result<(), BusError> {
        self.run_until(std::future::pending()).await
    }

    /// Forward traffic until `shutdown` completes.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), BusError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            operation = "relay_running",
            inbound = %self.inbound.endpoint,
            outbound = %self.outbound.endpoint,
            high_water_mark = self.high_water_mark,
            "Relay started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(operation = "relay_shutdown", "Relay stopping");
                    return Ok(());
                }
                accepted = self.inbound.listener.accept() => match accepted {
                    Ok((stream, _)) => self.inbound.attach(stream, self.high_water_mark, &mut self.tasks),
                    Err(e) => {
                        warn!(operation = "relay_accept", leg = "inbound", error = %e, "Error accepting connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                accepted = self.outbound.listener.accept() => match accepted {
                    Ok((stream, _)) => self.outbound.attach(stream, self.high_water_mark, &mut self.tasks),
                    Err(e) => {
                        warn!(operation = "relay_accept", leg = "outbound", error = %e, "Error accepting connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(frame) = self.inbound.frames_rx.recv() => {
                    self.outbound.broadcast(Frame::from(frame));
                }
                Some(frame) = self.outbound.frames_rx.recv() => {
                    self.inbound.broadcast(Frame::from(frame));
                }
                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    while self.tasks.try_join_next().is_some() {}
                    self.inbound.prune();
                    self.outbound.prune();
                }
            }
        }
    }
}
