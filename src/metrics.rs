//! Prometheus metrics for backend operations

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};
use std::time::Duration;

/// Query session metrics
pub struct SessionMetrics {
    /// Terminal operations issued
    pub requests: CounterVec,

    /// Terminal operation failures
    pub failures: CounterVec,

    /// Backend round-trip latency
    pub latency: HistogramVec,
}

lazy_static! {
    pub static ref SESSION_METRICS: SessionMetrics = SessionMetrics {
        requests: register_counter_vec!(
            "es_session_requests_total",
            "Total number of backend operations issued",
            &["operation"]
        )
        .unwrap(),

        failures: register_counter_vec!(
            "es_session_failures_total",
            "Total number of failed backend operations",
            &["operation", "error"]
        )
        .unwrap(),

        latency: register_histogram_vec!(
            "es_session_latency_seconds",
            "Backend operation latency in seconds",
            &["operation"]
        )
        .unwrap(),
    };
}

/// Initialize session metrics
pub fn init_session_metrics() {
    lazy_static::initialize(&SESSION_METRICS);
}

/// Record one finished operation
pub(crate) fn record(operation: &str, elapsed: Duration, error: Option<&str>) {
    SESSION_METRICS
        .requests
        .with_label_values(&[operation])
        .inc();
    SESSION_METRICS
        .latency
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());

    if let Some(error) = error {
        SESSION_METRICS
            .failures
            .with_label_values(&[operation, error])
            .inc();
    }
}
