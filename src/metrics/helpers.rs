//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    INGEST_REQUESTS_TOTAL, NOTIFICATIONS_CREATED_TOTAL, PUSH_DECISIONS_TOTAL,
    PUSH_DELIVERIES_TOTAL, PUSH_SEND_LATENCY, PUSH_STALE_TOKENS_REMOVED_TOTAL,
};
use crate::notification::{Priority, Provider};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording ingestion metrics
pub struct IngestMetrics;

impl IngestMetrics {
    /// Record one webhook call. `provider` is the raw path segment, bucketed
    /// to "unknown" when it names no provider.
    pub fn record_request(provider: &str, outcome: &str) {
        let label = provider
            .parse::<Provider>()
            .map(|p| p.as_str())
            .unwrap_or("unknown");
        INGEST_REQUESTS_TOTAL
            .with_label_values(&[label, outcome])
            .inc();
    }

    pub fn record_created(provider: Provider, priority: Priority) {
        NOTIFICATIONS_CREATED_TOTAL
            .with_label_values(&[provider.as_str(), priority.as_str()])
            .inc();
    }
}

/// Helper struct for recording push metrics
pub struct PushMetrics;

impl PushMetrics {
    pub fn record_decision(decision: &str) {
        PUSH_DECISIONS_TOTAL.with_label_values(&[decision]).inc();
    }

    pub fn record_deliveries(delivered: u64, invalid: u64, transient: u64) {
        PUSH_DELIVERIES_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(delivered);
        PUSH_DELIVERIES_TOTAL
            .with_label_values(&["invalid"])
            .inc_by(invalid);
        PUSH_DELIVERIES_TOTAL
            .with_label_values(&["transient"])
            .inc_by(transient);
    }

    pub fn record_stale_removed(count: u64) {
        PUSH_STALE_TOKENS_REMOVED_TOTAL.inc_by(count);
    }

    pub fn observe_send_latency(seconds: f64) {
        PUSH_SEND_LATENCY.observe(seconds);
    }
}
