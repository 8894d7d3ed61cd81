//! UDP listener that turns a datagram socket into per-peer sessions.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Demultiplex datagrams by peer address
//! - Open a `UdpConn` for each new peer and hand it to `accept()`
//! - Enforce `max_sessions` and per-session queue bounds

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};

use crate::config::ListenerConfig;
use crate::net::connection::{SessionTable, UdpConn};
use crate::observability::metrics;

/// New sessions waiting for `accept()`.
const ACCEPT_BACKLOG: usize = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Bind address did not parse.
    #[error("invalid bind address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },
}

/// A UDP listener producing one `UdpConn` per peer.
#[derive(Debug)]
pub struct UdpListener {
    local_addr: SocketAddr,
    sessions: SessionTable,
    accept_rx: mpsc::Receiver<UdpConn>,
}

impl UdpListener {
    /// Bind the socket and start the read loop.
    ///
    /// The read loop stops when `shutdown` fires or its sender is dropped.
    pub async fn bind(
        config: &ListenerConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, ListenerError> {
        let addr: SocketAddr =
            config
                .bind_address
                .parse()
                .map_err(|source| ListenerError::InvalidAddress {
                    address: config.bind_address.clone(),
                    source,
                })?;

        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { address: addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        let sessions: SessionTable = Arc::new(DashMap::new());
        let (accept_tx, accept_rx) = mpsc::channel(ACCEPT_BACKLOG);

        let reader = ReadLoop {
            socket: Arc::new(socket),
            sessions: sessions.clone(),
            accept_tx,
            max_sessions: config.max_sessions,
            session_queue: config.session_queue,
            max_datagram_size: config.max_datagram_size,
        };
        tokio::spawn(reader.run(shutdown));

        tracing::info!(
            address = %local_addr,
            max_sessions = config.max_sessions,
            "UDP listener bound"
        );

        Ok(Self {
            local_addr,
            sessions,
            accept_rx,
        })
    }

    /// Wait for the next new session. `None` once the listener has stopped.
    pub async fn accept(&mut self) -> Option<UdpConn> {
        self.accept_rx.recv().await
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of sessions currently open.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

struct ReadLoop {
    socket: Arc<UdpSocket>,
    sessions: SessionTable,
    accept_tx: mpsc::Sender<UdpConn>,
    max_sessions: usize,
    session_queue: usize,
    max_datagram_size: usize,
}

impl ReadLoop {
    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut buf = vec![0u8; self.max_datagram_size];
        loop {
            let (len, peer) = tokio::select! {
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(error = %e, "UDP receive failed");
                        continue;
                    }
                },
                _ = shutdown.recv() => break,
            };

            if !self.dispatch(peer, buf[..len].to_vec()).await {
                break;
            }
        }
        tracing::info!("UDP listener stopped");
    }

    /// Deliver a datagram to its session, opening one if needed.
    /// Returns `false` when nobody is accepting anymore.
    async fn dispatch(&self, peer: SocketAddr, datagram: Vec<u8>) -> bool {
        // The map guard must be released before the table is modified below.
        let datagram = match self.sessions.get(&peer) {
            Some(slot) => match slot.tx.try_send(datagram) {
                Ok(()) => return true,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(peer = %peer, "Session queue full, dropping datagram");
                    metrics::datagram_dropped("queue_full");
                    return true;
                }
                Err(TrySendError::Closed(datagram)) => datagram,
            },
            None => datagram,
        };

        // A slot whose conn went away without closing.
        self.sessions.remove(&peer);

        if self.sessions.len() >= self.max_sessions {
            tracing::warn!(
                peer = %peer,
                max_sessions = self.max_sessions,
                "Session limit reached, dropping datagram"
            );
            metrics::datagram_dropped("session_limit");
            return true;
        }

        let (conn, slot) = UdpConn::open(
            peer,
            self.socket.clone(),
            self.sessions.clone(),
            self.session_queue,
        );
        // Fresh queue with capacity >= 1, cannot be full.
        let _ = slot.tx.try_send(datagram);
        self.sessions.insert(peer, slot);
        metrics::session_opened();

        tracing::debug!(connection_id = %conn.id(), peer = %peer, "Session opened");

        self.accept_tx.send(conn).await.is_ok()
    }
}
