//! UDP forwarding backend.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::load_balancer::Handler;
use crate::net::connection::{Connection, UdpConn};

/// Largest datagram relayed back from a backend.
const MAX_REPLY_SIZE: usize = 65_535;

/// Errors ending a forwarded session early.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to open upstream socket to {target}: {source}")]
    Connect {
        target: SocketAddr,
        source: std::io::Error,
    },

    #[error("upstream {target} I/O error: {source}")]
    Upstream {
        target: SocketAddr,
        source: std::io::Error,
    },

    #[error("reply to {peer} failed: {source}")]
    Downstream {
        peer: SocketAddr,
        source: std::io::Error,
    },
}

/// Forwards a session's datagrams to one backend address.
#[derive(Debug, Clone)]
pub struct UdpProxy {
    name: String,
    target: SocketAddr,
    idle_timeout: Duration,
}

impl UdpProxy {
    pub fn new(name: impl Into<String>, target: SocketAddr, idle_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            target,
            idle_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    async fn forward(&self, conn: &mut UdpConn) -> Result<(), ProxyError> {
        let local: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let upstream = UdpSocket::bind(local).await.map_err(|source| ProxyError::Connect {
            target: self.target,
            source,
        })?;
        upstream
            .connect(self.target)
            .await
            .map_err(|source| ProxyError::Connect {
                target: self.target,
                source,
            })?;

        let mut buf = vec![0u8; MAX_REPLY_SIZE];
        loop {
            tokio::select! {
                inbound = conn.recv() => match inbound {
                    Some(datagram) => {
                        upstream.send(&datagram).await.map_err(|source| ProxyError::Upstream {
                            target: self.target,
                            source,
                        })?;
                    }
                    None => return Ok(()),
                },
                reply = upstream.recv(&mut buf) => {
                    let n = reply.map_err(|source| ProxyError::Upstream {
                        target: self.target,
                        source,
                    })?;
                    conn.send(&buf[..n]).await.map_err(|source| ProxyError::Downstream {
                        peer: conn.remote_addr(),
                        source,
                    })?;
                }
                _ = tokio::time::sleep(self.idle_timeout) => {
                    tracing::debug!(connection_id = %conn.id(), backend = %self.name, "Session idle, closing");
                    return Ok(());
                }
            }
        }
    }
}

impl Handler<UdpConn> for UdpProxy {
    /// Spawns the forwarding task; must be called inside a Tokio runtime.
    fn serve(&self, mut conn: UdpConn) {
        let proxy = self.clone();
        tokio::spawn(async move {
            tracing::debug!(
                connection_id = %conn.id(),
                peer = %conn.remote_addr(),
                backend = %proxy.name,
                target = %proxy.target,
                "Forwarding session"
            );
            if let Err(e) = proxy.forward(&mut conn).await {
                tracing::warn!(connection_id = %conn.id(), backend = %proxy.name, error = %e, "Session aborted");
            }
            conn.close();
        });
    }
}
