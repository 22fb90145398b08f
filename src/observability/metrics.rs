//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): forwarded calls by method, status
//! - `relay_request_duration_seconds` (histogram): end-to-end call latency
//! - `relay_redirects_total` (counter): redirect hops followed
//! - `relay_errors_total` (counter): failed calls by error kind

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed call. `status` is the origin status, or 500 when
/// the call failed.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [("method", method.to_string()), ("status", status.to_string())];
    counter!("relay_requests_total", &labels).increment(1);
    histogram!("relay_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_redirect() {
    counter!("relay_redirects_total").increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("relay_errors_total", "kind" => kind).increment(1);
}
