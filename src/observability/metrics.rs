//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_circuit_open_total` (counter): short-circuited requests
//!
//! # Design Decisions
//! - Labels for method, service, and status code
//! - Prometheus exposition on its own listener, separate from traffic

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exposition endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics endpoint"),
    }
}

/// Record one completed inbound request.
pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("service", service.to_string()),
    ];
    metrics::counter!("gateway_requests_total", &labels).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a request refused by an open circuit.
pub fn record_circuit_open(service: &str) {
    metrics::counter!("gateway_circuit_open_total", "service" => service.to_string()).increment(1);
}
