//! Prometheus metrics for the composer engine
//!
//! Counters are registered in the default registry; the embedding service
//! exposes them with [`gather`].

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    /// Counter: publish dispatches by platform and outcome
    pub static ref PUBLISH_DISPATCHES: CounterVec = register_counter_vec!(
        "crosspost_publish_dispatches_total",
        "Publish calls dispatched per platform",
        &["platform", "outcome"]
    )
    .expect("Failed to create publish_dispatches metric");

    /// Counter: handshake resolutions by platform and outcome
    pub static ref HANDSHAKE_RESOLUTIONS: CounterVec = register_counter_vec!(
        "crosspost_handshake_resolutions_total",
        "External-auth handshakes resolved per platform",
        &["platform", "outcome"]
    )
    .expect("Failed to create handshake_resolutions metric");

    /// Counter: assistant turns by outcome kind
    pub static ref ASSISTANT_TURNS: CounterVec = register_counter_vec!(
        "crosspost_assistant_turns_total",
        "Assistant chat turns by outcome",
        &["outcome"]
    )
    .expect("Failed to create assistant_turns metric");

    /// Counter: operations rejected by plan-tier limits
    pub static ref QUOTA_REJECTIONS: CounterVec = register_counter_vec!(
        "crosspost_quota_rejections_total",
        "Operations blocked by plan-tier quotas",
        &["kind", "tier"]
    )
    .expect("Failed to create quota_rejections metric");
}

/// Record one publish dispatch
pub fn record_dispatch(platform: &str, success: bool) {
    PUBLISH_DISPATCHES
        .with_label_values(&[platform, if success { "success" } else { "failure" }])
        .inc();
}

/// Record a handshake resolution
pub fn record_handshake(platform: &str, outcome: &str) {
    HANDSHAKE_RESOLUTIONS
        .with_label_values(&[platform, outcome])
        .inc();
}

/// Record an assistant turn
pub fn record_assistant_turn(outcome: &str) {
    ASSISTANT_TURNS.with_label_values(&[outcome]).inc();
}

/// Record a quota rejection
pub fn record_quota_rejection(kind: &str, tier: &str) {
    QUOTA_REJECTIONS.with_label_values(&[kind, tier]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
