//! Metrics collection and exposition.
//!
//! # Metrics
//! - `udp_balancer_routed_total` (counter): sessions handed to a backend, by backend index
//! - `udp_balancer_route_errors_total` (counter): sessions closed because no backend was available
//! - `udp_balancer_sessions_total` (counter): sessions opened by the listener
//! - `udp_balancer_datagrams_dropped_total` (counter): datagrams dropped, by reason
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const ROUTED_TOTAL: &str = "udp_balancer_routed_total";
pub const ROUTE_ERRORS_TOTAL: &str = "udp_balancer_route_errors_total";
pub const SESSIONS_TOTAL: &str = "udp_balancer_sessions_total";
pub const DATAGRAMS_DROPPED_TOTAL: &str = "udp_balancer_datagrams_dropped_total";

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn connection_routed(backend: usize) {
    metrics::counter!(ROUTED_TOTAL, "backend" => backend.to_string()).increment(1);
}

pub fn route_failed() {
    metrics::counter!(ROUTE_ERRORS_TOTAL).increment(1);
}

pub fn session_opened() {
    metrics::counter!(SESSIONS_TOTAL).increment(1);
}

pub fn datagram_dropped(reason: &'static str) {
    metrics::counter!(DATAGRAMS_DROPPED_TOTAL, "reason" => reason).increment(1);
}
