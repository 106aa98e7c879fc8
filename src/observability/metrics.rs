//! Metrics collection and exposition.
//!
//! # Metrics
//! - `restconf_requests_total` (counter): requests by method, status
//! - `restconf_request_duration_seconds` (histogram): latency by method
//! - `restconf_active_event_streams` (gauge): open SSE responses
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Event streams are excluded from latency: they end when the client leaves

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "restconf_requests_total";
pub const REQUEST_DURATION: &str = "restconf_request_duration_seconds";
pub const ACTIVE_EVENT_STREAMS: &str = "restconf_active_event_streams";

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(REQUEST_DURATION, "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn event_stream_opened() {
    gauge!(ACTIVE_EVENT_STREAMS).increment(1.0);
}

pub fn event_stream_closed() {
    gauge!(ACTIVE_EVENT_STREAMS).decrement(1.0);
}
