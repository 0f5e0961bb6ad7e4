//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatcher metrics (requests, latency, handler loads, cache size)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, project
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//! - `handler_loads_total` (counter): cache lookups by outcome
//!   (hit, load, reload, error)
//! - `handler_cache_entries` (gauge): resident handler units
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels stay low-cardinality: no handler names, unknown projects and
//!   non-standard methods collapse into fixed values

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics_exporter_prometheus::PrometheusBuilder;

/// `project` label for requests that did not name an existing project.
pub const UNKNOWN_PROJECT: &str = "-";

/// `method` label for extension methods.
pub const OTHER_METHOD: &str = "OTHER";

const STANDARD_METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::CONNECT,
    Method::TRACE,
];

/// Bounded `method` label.
pub fn method_label(method: &Method) -> &'static str {
    STANDARD_METHODS
        .iter()
        .find(|m| *m == method)
        .map_or(OTHER_METHOD, Method::as_str)
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request. `project` must already be a bounded label.
pub fn record_request(method: &Method, status: u16, project: &str, start: Instant) {
    let labels = [
        ("method", method_label(method).to_string()),
        ("status", status.to_string()),
        ("project", project.to_string()),
    ];
    metrics::counter!("dispatch_requests_total", &labels).increment(1);
    metrics::histogram!("dispatch_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a module cache lookup outcome.
pub fn record_handler_load(outcome: &'static str) {
    metrics::counter!("handler_loads_total", "outcome" => outcome).increment(1);
}

/// Record the number of resident handler units.
pub fn record_cache_entries(count: usize) {
    metrics::gauge!("handler_cache_entries").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_label_is_bounded() {
        assert_eq!(method_label(&Method::GET), "GET");
        assert_eq!(method_label(&Method::OPTIONS), "OPTIONS");
        let custom = Method::from_bytes(b"PURGE-1234").unwrap();
        assert_eq!(method_label(&custom), OTHER_METHOD);
    }
}
