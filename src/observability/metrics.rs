//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): proxied requests by method, status, backend
//! - `router_request_duration_seconds` (histogram): end-to-end proxy latency
//! - `router_backend_active_connections` (gauge): claimed slots per backend
//! - `router_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `router_health_probes_total` (counter): probe outcomes per backend

use std::net::SocketAddr;
use std::time::Instant;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "router_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "router_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(backend: &str, active: usize) {
    metrics::gauge!("router_backend_active_connections", "backend" => backend.to_string())
        .set(active as f64);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("router_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_probe(backend: &str, healthy: bool) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    metrics::counter!(
        "router_health_probes_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
