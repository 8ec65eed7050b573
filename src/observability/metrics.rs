//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_rate_limited_total{tier}` (counter): requests rejected with 429
//! - `guard_store_failures_total{tier,policy}` (counter): counter store outages
//! - `guard_csrf_rejections_total{reason}` (counter): requests rejected with 403
//! - `guard_csrf_tokens_issued_total` (counter): fresh tokens handed out
//!
//! Recording is a no-op until a recorder is installed, so tests and library
//! users without Prometheus pay nothing.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rate_limited(tier: &'static str) {
    metrics::counter!("guard_rate_limited_total", "tier" => tier).increment(1);
}

pub fn record_store_failure(tier: &'static str, policy: &'static str) {
    metrics::counter!("guard_store_failures_total", "tier" => tier, "policy" => policy).increment(1);
}

pub fn record_csrf_rejection(reason: &'static str) {
    metrics::counter!("guard_csrf_rejections_total", "reason" => reason).increment(1);
}

pub fn record_token_issued() {
    metrics::counter!("guard_csrf_tokens_issued_total").increment(1);
}
