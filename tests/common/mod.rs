//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use udp_hash_balancer::{Connection, Handler};

/// Start a UDP backend that answers every datagram with `tag`.
#[allow(dead_code)]
pub async fn start_tagged_backend(tag: &'static str) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        while let Ok((_, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(tag.as_bytes(), from).await;
        }
    });

    addr
}

/// Connection double with a fixed peer address and a close counter.
#[allow(dead_code)]
pub struct FakeConn {
    pub addr: SocketAddr,
    pub closes: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeConn {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Connection for FakeConn {
    fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handler double appending its index to a shared log.
#[allow(dead_code)]
pub struct RecordingHandler {
    pub index: usize,
    pub served: Arc<Mutex<Vec<usize>>>,
}

impl Handler<FakeConn> for RecordingHandler {
    fn serve(&self, _conn: FakeConn) {
        self.served.lock().unwrap().push(self.index);
    }
}
