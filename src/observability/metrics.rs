//! Metrics collection and exposition.
//!
//! # Metrics
//! - `intercept_transactions_total` (counter): finished transactions by proxy, outcome
//! - `intercept_transaction_duration_seconds` (histogram): time from accept to close
//! - `intercept_active_transactions` (gauge): in-flight transactions per proxy
//! - `intercept_unsupported_encoding_total` (counter): bodies rejected for their transfer coding
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished transaction.
pub fn record_transaction(proxy: &str, outcome: &'static str, started: Instant) {
    metrics::counter!(
        "intercept_transactions_total",
        "proxy" => proxy.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "intercept_transaction_duration_seconds",
        "proxy" => proxy.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Publish the in-flight transaction count for `proxy`.
pub fn record_active_transactions(proxy: &str, count: u64) {
    metrics::gauge!("intercept_active_transactions", "proxy" => proxy.to_string()).set(count as f64);
}

pub fn record_unsupported_encoding(proxy: &str) {
    metrics::counter!("intercept_unsupported_encoding_total", "proxy" => proxy.to_string()).increment(1);
}
