//! UDP sessions and the connection capability the router consumes.
//!
//! # Responsibilities
//! - Define the `Connection` capability (peer address + close)
//! - Generate unique connection IDs for tracing
//! - Represent one peer's datagram stream as a `UdpConn`
//! - Release the session slot on close or drop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough, only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the router needs from an accepted connection.
pub trait Connection: Send + 'static {
    /// Address of the remote peer.
    fn remote_addr(&self) -> SocketAddr;

    /// Close the connection. Calling it more than once is a no-op.
    fn close(&self);
}

/// The listener's handle on a live session.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    pub(crate) id: ConnectionId,
    pub(crate) tx: mpsc::Sender<Vec<u8>>,
}

/// Live sessions keyed by peer address, shared by the listener and its conns.
pub(crate) type SessionTable = Arc<DashMap<SocketAddr, SessionSlot>>;

/// One peer's datagram session on a shared listening socket.
///
/// Inbound datagrams are queued by the listener; replies go out through
/// the listening socket so the peer sees them from the address it used.
#[derive(Debug)]
pub struct UdpConn {
    id: ConnectionId,
    peer: SocketAddr,
    socket: Arc<UdpSocket>,
    inbound: mpsc::Receiver<Vec<u8>>,
    sessions: SessionTable,
    closed: AtomicBool,
}

impl UdpConn {
    /// Create a conn and the slot the listener keeps for it.
    pub(crate) fn open(
        peer: SocketAddr,
        socket: Arc<UdpSocket>,
        sessions: SessionTable,
        queue: usize,
    ) -> (Self, SessionSlot) {
        let (tx, inbound) = mpsc::channel(queue);
        let id = ConnectionId::new();
        let conn = Self {
            id,
            peer,
            socket,
            inbound,
            sessions,
            closed: AtomicBool::new(false),
        };
        (conn, SessionSlot { id, tx })
    }

    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next datagram from the peer. `None` once the session is closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        if self.is_closed() {
            return None;
        }
        self.inbound.recv().await
    }

    /// Send a datagram back to the peer.
    pub async fn send(&self, payload: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(payload, self.peer).await
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Connection for UdpConn {
    fn remote_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // The peer may already own a newer session; only drop our own slot.
        self.sessions.remove_if(&self.peer, |_, slot| slot.id == self.id);
        tracing::trace!(connection_id = %self.id, peer = %self.peer, "Session closed");
    }
}

impl Drop for UdpConn {
    fn drop(&mut self) {
        self.close();
    }
}
