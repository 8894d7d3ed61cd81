//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! New session accepted → AddressHashRouter::route
//!     → hash.rs (FNV-1a over the source IP text)
//!     → address_hash.rs (hash mod pool size, under the pool lock)
//!     → backend.rs (entry at that index)
//!     → Handler::serve (backend owns the session from here)
//! ```
//!
//! # Design Decisions
//! - Selection is a pure function of source IP and pool snapshot
//! - Pool is append-only; growing it remaps addresses
//! - No health checks, no weighting, no retries

pub mod address_hash;
pub mod backend;
pub mod error;
pub mod hash;

pub use address_hash::AddressHashRouter;
pub use backend::BackendEntry;
pub use error::{RouteError, RouteResult};

/// A capability that services connections of type `C`.
///
/// `serve` takes ownership of the connection, closing it included.
pub trait Handler<C>: Send + Sync {
    /// Service `conn`.
    fn serve(&self, conn: C);
}
