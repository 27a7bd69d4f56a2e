//! Pool metrics
//!
//! Emitted through the `metrics` facade; calls are no-ops until the binary
//! installs a recorder.
//!
//! - `kiro_token_selections_total` (counter): label `result` (`ok`, `no_usable_token`)
//! - `kiro_token_refreshes_total` (counter): label `result` (`ok`, `error`)
//! - `kiro_usage_checks_total` (counter): label `result` (`ok`, `error`)
//! - `kiro_token_refresh_duration_seconds` (histogram)

pub const REFRESH_DURATION_SECONDS: &str = "kiro_token_refresh_duration_seconds";

pub fn record_selection(result: &'static str) {
    metrics::counter!("kiro_token_selections_total", "result" => result).increment(1);
}

pub fn record_refresh(result: &'static str, duration_secs: f64) {
    metrics::counter!("kiro_token_refreshes_total", "result" => result).increment(1);
    metrics::histogram!(REFRESH_DURATION_SECONDS).record(duration_secs);
}

pub fn record_usage_check(result: &'static str) {
    metrics::counter!("kiro_usage_checks_total", "result" => result).increment(1);
}
