//! Backend handlers.
//!
//! # Data Flow
//! ```text
//! Router picks a backend → Handler::serve(UdpConn)
//!     → udp.rs (spawn forwarding task)
//!         - peer → backend over a connected ephemeral socket
//!         - backend → peer through the listening socket
//!     → idle timeout or error closes the session
//! ```

pub mod udp;

pub use udp::{ProxyError, UdpProxy};
