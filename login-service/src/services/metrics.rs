//! Prometheus metrics for login-service.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!("login_db_query_duration_seconds", "Database query duration"),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Login decisions by granting authority (local, upstream, none).
pub static LOGIN_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Requests issued to the upstream identity provider.
pub static UPSTREAM_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Post-decision sync side effects by direction and outcome.
pub static SYNC_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    LOGIN_ATTEMPTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "login_attempts_total",
                "Total login attempts by granting authority"
            ),
            &["authority"]
        )
        .expect("Failed to register LOGIN_ATTEMPTS_TOTAL")
    });

    UPSTREAM_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "login_upstream_requests_total",
                "Total requests to the upstream identity provider"
            ),
            &["operation", "outcome"]
        )
        .expect("Failed to register UPSTREAM_REQUESTS_TOTAL")
    });

    SYNC_ATTEMPTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "login_sync_attempts_total",
                "Total one-way sync side effects by direction"
            ),
            &["direction", "outcome"]
        )
        .expect("Failed to register SYNC_ATTEMPTS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record which authority granted (or denied) a login.
pub fn record_login(authority: &str) {
    if let Some(counter) = LOGIN_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[authority]).inc();
    }
}

/// Record a request to the upstream provider.
pub fn record_upstream_request(operation: &str, outcome: &str) {
    if let Some(counter) = UPSTREAM_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}

/// Record a sync side effect.
pub fn record_sync(direction: &str, outcome: &str) {
    if let Some(counter) = SYNC_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[direction, outcome]).inc();
    }
}
