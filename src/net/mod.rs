//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming UDP datagram
//!     → listener.rs (read loop, demux by peer address, session limits)
//!     → connection.rs (UdpConn per peer, lifecycle tracking)
//!     → Hand off to the load balancer
//!
//! Session States:
//!     Opened → Routed → Closed (by handler, idle timeout, or drop)
//! ```
//!
//! # Design Decisions
//! - Bounded session table prevents resource exhaustion
//! - Per-session queues are bounded; overflow drops datagrams
//! - Replies leave through the listening socket

pub mod connection;
pub mod listener;
