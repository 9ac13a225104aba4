//! Prometheus metrics for the broadcast service.
//!
//! This module provides:
//! - Connection metrics (registered, live, subscribers by role)
//! - Broadcast metrics (calls by audience, delivered, failed, skipped)
//! - WebSocket metrics (opened, closed, duration, inbound messages)
//! - Sweeper metrics

mod helpers;

pub use helpers::{encode_metrics, BroadcastMetrics, ConnectionMetrics, WsMessageMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "broadcast";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Registered connections, including ones whose transport already closed
    pub static ref CONNECTIONS_REGISTERED: IntGauge = register_int_gauge!(
        format!("{}_connections_registered", METRIC_PREFIX),
        "Number of registered WebSocket connections"
    ).unwrap();

    /// Connections whose transport is open
    pub static ref CONNECTIONS_LIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_live", METRIC_PREFIX),
        "Number of live WebSocket connections"
    ).unwrap();

    /// Bound subscriber identities by role
    pub static ref SUBSCRIBERS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_subscribers", METRIC_PREFIX),
        "Number of bound subscriber identities per role",
        &["role"]
    ).unwrap();

    /// Connections removed by the sweeper
    pub static ref SWEEP_PRUNED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sweep_pruned_total", METRIC_PREFIX),
        "Total closed connections removed by the sweeper"
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Broadcast calls by audience
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcast calls",
        &["audience"]
    ).unwrap();

    /// Frames accepted by a recipient's outbound buffer
    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total frames handed to recipient connections"
    ).unwrap();

    /// Per-recipient send failures
    pub static ref MESSAGES_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total per-recipient send failures",
        &["reason"]
    ).unwrap();

    /// Bound recipients skipped because their connection was gone
    pub static ref MESSAGES_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_skipped_total", METRIC_PREFIX),
        "Total role-bound recipients skipped because they were no longer live"
    ).unwrap();

    // ============================================================================
    // WebSocket Metrics
    // ============================================================================

    /// WebSocket connections opened
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// WebSocket connections closed
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// WebSocket connection duration
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();

    /// Inbound messages by type
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total WebSocket messages received from clients",
        &["type"]
    ).unwrap();

    /// Inbound messages discarded by the router
    pub static ref WS_MESSAGES_DISCARDED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_discarded_total", METRIC_PREFIX),
        "Total inbound messages discarded",
        &["reason"]
    ).unwrap();
}
