//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): time to response headers
//! - `gateway_upstream_attempts_total` (counter): upstream attempts by outcome
//! - `gateway_auth_rejections_total` (counter): caller rejections by reason
//! - `gateway_streams_active` (gauge): relays currently pumping chunks
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of `ok`, `retry`, `exhausted`, `failed`.
pub fn record_upstream_attempt(outcome: &'static str) {
    counter!("gateway_upstream_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_auth_rejection(reason: &'static str) {
    counter!("gateway_auth_rejections_total", "reason" => reason).increment(1);
}

/// Tracks one active relay; the gauge is decremented on drop.
pub struct ActiveStream(());

impl ActiveStream {
    pub fn start() -> Self {
        gauge!("gateway_streams_active").increment(1.0);
        Self(())
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        gauge!("gateway_streams_active").decrement(1.0);
    }
}
