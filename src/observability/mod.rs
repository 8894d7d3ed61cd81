//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listener, router and proxies produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Connection ID and peer address flow through session logs
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
