//! Prometheus metrics exposition
//!
//! The pool emits its own counters through the `metrics` facade (see
//! `kiro_pool::metrics`). This module installs the recorder and adds the
//! HTTP-level counter:
//!
//! - `broker_token_requests_total` (counter): label `result`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries for upstream refresh latency, 10ms to 30s.
const REFRESH_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(kiro_pool::metrics::REFRESH_DURATION_SECONDS.to_string()),
            REFRESH_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The refresh-duration histogram gets explicit buckets so it renders with
/// `_bucket` lines instead of as a summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one `/token` request outcome.
pub fn record_token_request(result: &'static str) {
    metrics::counter!("broker_token_requests_total", "result" => result).increment(1);
}
