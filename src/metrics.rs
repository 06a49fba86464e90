use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

lazy_static! {
    // Decision metrics
    pub static ref DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limiter_decisions_total",
        "Total number of rate limit decisions",
        &["strategy", "allowed"]
    ).expect("register rate_limiter_decisions_total");

    pub static ref DECISION_DURATION: HistogramVec = register_histogram_vec!(
        "rate_limiter_decision_duration_seconds",
        "Decision duration in seconds, store round trip included",
        &["strategy"],
        vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).expect("register rate_limiter_decision_duration_seconds");

    // Store metrics
    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "rate_limiter_store_duration_seconds",
        "Store command duration in seconds",
        &["command"],
        vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]
    ).expect("register rate_limiter_store_duration_seconds");

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limiter_store_errors_total",
        "Total number of store errors",
        &["error_type"]
    ).expect("register rate_limiter_store_errors_total");

    pub static ref SCRIPT_EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limiter_script_executions_total",
        "Total number of Lua script executions",
        &["script", "result"]
    ).expect("register rate_limiter_script_executions_total");
}

/// Record a rate limit decision
pub fn record_decision(strategy: &str, allowed: bool, duration_secs: f64) {
    let allowed_str = if allowed { "true" } else { "false" };
    DECISIONS_TOTAL
        .with_label_values(&[strategy, allowed_str])
        .inc();

    DECISION_DURATION
        .with_label_values(&[strategy])
        .observe(duration_secs);
}

/// Record store command duration
pub fn record_store_duration(command: &str, duration_secs: f64) {
    STORE_DURATION
        .with_label_values(&[command])
        .observe(duration_secs);
}

/// Record store error
pub fn record_store_error(error_type: &str) {
    STORE_ERRORS_TOTAL
        .with_label_values(&[error_type])
        .inc();
}

/// Record script execution
pub fn record_script_execution(script: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    SCRIPT_EXECUTIONS_TOTAL
        .with_label_values(&[script, result])
        .inc();
}

/// Encode every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, String> {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_decisions_are_exported() {
        record_decision("token_bucket", true, 0.001);
        record_decision("token_bucket", false, 0.002);

        assert!(DECISIONS_TOTAL.with_label_values(&["token_bucket", "true"]).get() >= 1);

        let text = gather_text().unwrap();
        assert!(text.contains("rate_limiter_decisions_total"));
        assert!(text.contains("rate_limiter_decision_duration_seconds"));
    }
}
