//! Metrics collection and exposition.
//!
//! # Metrics
//! - `blog_http_requests_total` (counter): requests by method, status
//! - `blog_shutdown_requests_total` (counter): shutdown attempts by outcome
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! metrics-disabled runs pay nothing.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16) {
    counter!(
        "blog_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// `outcome` is "accepted" or "ignored".
pub fn record_shutdown_request(outcome: &'static str) {
    counter!("blog_shutdown_requests_total", "outcome" => outcome).increment(1);
}
