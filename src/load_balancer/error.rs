//! Routing error types.

use thiserror::Error;

/// Errors the router can detect on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No backends registered.
    #[error("no servers in the pool")]
    EmptyPool,
}

/// Result type for routing decisions.
pub type RouteResult<T> = Result<T, RouteError>;
