//! Prometheus metrics for the funnel service.
//!
//! - Ingestion outcomes per provider
//! - Notifications created per provider and priority
//! - Push policy decisions, per-token delivery outcomes and send latency

mod helpers;

pub use helpers::{encode_metrics, IngestMetrics, PushMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "funnel";

lazy_static! {
    // ============================================================================
    // Ingestion Metrics
    // ============================================================================

    /// Webhook calls by provider path segment and outcome code
    pub static ref INGEST_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ingest_requests_total", METRIC_PREFIX),
        "Total webhook ingestion requests",
        &["provider", "outcome"]
    ).unwrap();

    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notifications persisted",
        &["provider", "priority"]
    ).unwrap();

    // ============================================================================
    // Push Metrics
    // ============================================================================

    /// Dispatch decisions (sent, suppressed reason, no devices, ...)
    pub static ref PUSH_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_decisions_total", METRIC_PREFIX),
        "Total push dispatch decisions",
        &["decision"]
    ).unwrap();

    pub static ref PUSH_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_deliveries_total", METRIC_PREFIX),
        "Per-token push delivery outcomes",
        &["outcome"]
    ).unwrap();

    pub static ref PUSH_STALE_TOKENS_REMOVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_stale_tokens_removed_total", METRIC_PREFIX),
        "Total device tokens removed after a permanent delivery failure"
    ).unwrap();

    /// Batched send latency, including failures and timeouts
    pub static ref PUSH_SEND_LATENCY: Histogram = register_histogram!(
        format!("{}_push_send_latency_seconds", METRIC_PREFIX),
        "Push transport send latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}
