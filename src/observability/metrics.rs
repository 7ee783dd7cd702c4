//! Metrics collection and exposition.
//!
//! # Metrics
//! - `response_hook_responses_total` (counter): responses by method, status
//! - `response_hook_response_bytes_total` (counter): body bytes seen by hooks
//! - `response_hook_response_duration_seconds` (histogram): handler latency
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Status is a label; byte counts are not

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Record one served response.
pub fn record_response(method: &str, status: u16, bytes: u64, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!(
        "response_hook_responses_total",
        "method" => method.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::counter!("response_hook_response_bytes_total", "method" => method.clone())
        .increment(bytes);
    metrics::histogram!(
        "response_hook_response_duration_seconds",
        "method" => method,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}
