//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → listener read loop exits → accept() yields None → server returns
//! ```
//!
//! # Design Decisions
//! - Forwarding tasks already running finish on their own idle timeout
//! - Shutdown is a broadcast so any number of listeners can subscribe

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
