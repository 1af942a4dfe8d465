// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, HistogramVec, Opts, Registry, TextEncoder, Encoder,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // CALL METRICS
    // ============================================================================

    /// Total gateway calls by outcome
    pub static ref GATEWAY_CALLS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gateway_calls_total", "Total gateway calls"),
        &["alias", "operation", "outcome"], // outcome: success, failure, cancelled, error
        REGISTRY
    ).unwrap();

    /// Time from dispatch to response headers
    pub static ref GATEWAY_CALL_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("gateway_call_duration_seconds", "Gateway call duration in seconds")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["alias", "operation"],
        REGISTRY
    ).unwrap();

    /// Upstream HTTP status codes
    pub static ref UPSTREAM_RESPONSES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gateway_upstream_responses_total", "Upstream responses by status code"),
        &["alias", "status_code"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // FALLBACK METRICS
    // ============================================================================

    /// Fallback resolutions
    pub static ref FALLBACK_INVOCATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gateway_fallbacks_total", "Total fallback resolutions"),
        &["alias", "operation", "result"], // result: handled, none, error
        REGISTRY
    ).unwrap();

    // ============================================================================
    // HEADER METRICS
    // ============================================================================

    /// Header bindings dropped because the header template has no such slot
    pub static ref DROPPED_HEADERS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gateway_dropped_headers_total", "Header bindings without a template slot"),
        &["alias", "operation", "header"],
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
