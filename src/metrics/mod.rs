// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    REGISTRY,
    GATEWAY_CALLS,
    GATEWAY_CALL_DURATION,
    UPSTREAM_RESPONSES,
    FALLBACK_INVOCATIONS,
    DROPPED_HEADERS,
};

/// Helper to record the outcome of one call
pub fn record_call(alias: &str, operation: &str, outcome: &str) {
    GATEWAY_CALLS
        .with_label_values(&[alias, operation, outcome])
        .inc();
}

/// Helper to record an upstream round trip
pub fn record_upstream(alias: &str, operation: &str, status_code: u16, duration_secs: f64) {
    UPSTREAM_RESPONSES
        .with_label_values(&[alias, &status_code.to_string()])
        .inc();

    GATEWAY_CALL_DURATION
        .with_label_values(&[alias, operation])
        .observe(duration_secs);
}

/// Helper to record a fallback resolution
pub fn record_fallback(alias: &str, operation: &str, result: &str) {
    FALLBACK_INVOCATIONS
        .with_label_values(&[alias, operation, result])
        .inc();
}

/// Helper to record a dropped header binding
pub fn record_dropped_header(alias: &str, operation: &str, header: &str) {
    DROPPED_HEADERS
        .with_label_values(&[alias, operation, header])
        .inc();
}

/// Current value of the dropped-header counter for one header.
#[cfg(test)]
pub(crate) fn dropped_header_count(alias: &str, operation: &str, header: &str) -> u64 {
    DROPPED_HEADERS
        .with_label_values(&[alias, operation, header])
        .get() as u64
}
