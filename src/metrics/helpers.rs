//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::connection_manager::{ConnectionStats, SendError};
use crate::subscriber::RoleCounts;

use super::{
    BROADCASTS_TOTAL, CONNECTIONS_LIVE, CONNECTIONS_REGISTERED, MESSAGES_DELIVERED_TOTAL,
    MESSAGES_FAILED_TOTAL, MESSAGES_SKIPPED_TOTAL, SUBSCRIBERS, SWEEP_PRUNED_TOTAL,
    WS_MESSAGES_DISCARDED, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording broadcast metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record_call(audience: &str) {
        BROADCASTS_TOTAL.with_label_values(&[audience]).inc();
    }

    pub fn record_delivered(count: u64) {
        MESSAGES_DELIVERED_TOTAL.inc_by(count);
    }

    pub fn record_failure(error: SendError) {
        let reason = match error {
            SendError::NotFound => "not_found",
            SendError::Closed => "closed",
            SendError::Full => "full",
        };
        MESSAGES_FAILED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_skipped(count: u64) {
        MESSAGES_SKIPPED_TOTAL.inc_by(count);
    }
}

/// Helper struct for inbound WebSocket message metrics
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    /// `kind` must come from the fixed inbound vocabulary to bound cardinality
    pub fn record_received(kind: &str) {
        WS_MESSAGES_RECEIVED.with_label_values(&[kind]).inc();
    }

    pub fn record_decode_error() {
        WS_MESSAGES_DISCARDED.with_label_values(&["decode"]).inc();
    }

    pub fn record_payload_error() {
        WS_MESSAGES_DISCARDED.with_label_values(&["payload"]).inc();
    }

    pub fn record_unrecognized() {
        WS_MESSAGES_DISCARDED.with_label_values(&["unrecognized"]).inc();
    }

    pub fn record_binary() {
        WS_MESSAGES_DISCARDED.with_label_values(&["binary"]).inc();
    }
}

/// Helper struct for connection gauges
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn update(stats: &ConnectionStats, roles: &RoleCounts) {
        CONNECTIONS_REGISTERED.set(stats.total_connections as i64);
        CONNECTIONS_LIVE.set(stats.live_connections as i64);
        SUBSCRIBERS.with_label_values(&["admin"]).set(roles.admins as i64);
        SUBSCRIBERS.with_label_values(&["user"]).set(roles.users as i64);
        SUBSCRIBERS.with_label_values(&["other"]).set(roles.other as i64);
    }

    pub fn record_pruned(count: u64) {
        SWEEP_PRUNED_TOTAL.inc_by(count);
    }
}
