//! UDP source-address hash balancer.
//!
//! Each new UDP session (one per peer address) is handed to
//! `backends[fnv1a_32(source IP) mod backends.len()]`.

pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod server;

pub use config::BalancerConfig;
pub use lifecycle::Shutdown;
pub use load_balancer::{AddressHashRouter, Handler};
pub use net::connection::{Connection, UdpConn};
pub use server::UdpServer;
