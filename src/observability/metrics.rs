//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pipeline metrics (requests, latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `pipeline_requests_total` (counter): requests by route, status, moment
//! - `pipeline_request_duration_seconds` (histogram): latency by route
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for route, status code and the moment the pipeline ended at

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "pipeline_requests_total";
pub const REQUEST_DURATION: &str = "pipeline_request_duration_seconds";

/// Starts the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Records the outcome of one pipeline run.
pub fn record_outcome(route: &str, status: u16, moment: &'static str, started: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "status" => status.to_string(),
        "moment" => moment
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}
