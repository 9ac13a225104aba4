//! Broadcast fan-out over the connection registry.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::connection_manager::{ConnectionHandle, ConnectionRegistry, Frame};
use crate::metrics::BroadcastMetrics;
use crate::subscriber::{Role, SubscriberDirectory};
use crate::telemetry::sanitize_for_log;
use crate::websocket::codec;

use super::types::{Audience, DeliveryResult, DispatcherStats, DispatcherStatsSnapshot};

/// Fans encoded envelopes out to live connections.
///
/// Sends are fire-and-forget: each recipient gets one non-blocking attempt,
/// and a failure for one recipient never stops the loop. The envelope is
/// encoded once per call and the frame is shared by every recipient.
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<SubscriberDirectory>,
    stats: DispatcherStats,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, directory: Arc<SubscriberDirectory>) -> Self {
        Self {
            registry,
            directory,
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn dispatch(&self, audience: Audience, kind: &str, payload: &Value) -> DeliveryResult {
        match audience.role() {
            Some(role) => self.broadcast_to_role(&role, kind, payload),
            None => self.broadcast_all(kind, payload),
        }
    }

    /// Send to every live connection, classified or not
    #[tracing::instrument(
        name = "dispatcher.broadcast_all",
        skip(self, kind, payload),
        fields(message_type = %sanitize_for_log(kind))
    )]
    pub fn broadcast_all(&self, kind: &str, payload: &Value) -> DeliveryResult {
        let mut result = DeliveryResult::default();

        if let Some(frame) = encode_now(kind, payload) {
            self.registry.for_each_live(|handle| {
                deliver(handle, &frame, &mut result);
            });
        }

        self.finish(None, kind, result)
    }

    /// Send to every live connection bound to `role`
    #[tracing::instrument(
        name = "dispatcher.broadcast_to_role",
        skip(self, role, kind, payload),
        fields(role = %sanitize_for_log(role.as_str()), message_type = %sanitize_for_log(kind))
    )]
    pub fn broadcast_to_role(&self, role: &Role, kind: &str, payload: &Value) -> DeliveryResult {
        let mut result = DeliveryResult::default();

        if let Some(frame) = encode_now(kind, payload) {
            // Resolve targets before sending so no directory shard stays locked
            let targets: Vec<_> = self.directory.connection_ids_with_role(role).collect();

            for connection_id in targets {
                match self.registry.get(&connection_id) {
                    Some(handle) if handle.is_open() => deliver(&handle, &frame, &mut result),
                    _ => result.skipped += 1,
                }
            }
        }

        self.finish(Some(role), kind, result)
    }

    pub fn broadcast_to_users(&self, kind: &str, payload: &Value) -> DeliveryResult {
        self.broadcast_to_role(&Role::User, kind, payload)
    }

    pub fn broadcast_to_admins(&self, kind: &str, payload: &Value) -> DeliveryResult {
        self.broadcast_to_role(&Role::Admin, kind, payload)
    }

    fn finish(&self, role: Option<&Role>, kind: &str, result: DeliveryResult) -> DeliveryResult {
        self.stats.record(role, &result);

        let label = match role {
            None => "all",
            Some(Role::User) => "user",
            Some(Role::Admin) => "admin",
            Some(Role::Other(_)) => "other",
        };
        BroadcastMetrics::record_call(label);
        BroadcastMetrics::record_delivered(result.delivered as u64);
        BroadcastMetrics::record_skipped(result.skipped as u64);

        tracing::debug!(
            audience = label,
            message_type = %sanitize_for_log(kind),
            delivered = result.delivered,
            failed = result.failed,
            skipped = result.skipped,
            "Broadcast completed"
        );

        result
    }
}

/// Encode with the send-time timestamp
fn encode_now(kind: &str, payload: &Value) -> Option<Frame> {
    match codec::encode(kind, payload, Utc::now().timestamp_millis()) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(
                message_type = %sanitize_for_log(kind),
                error = %e,
                "Failed to encode broadcast envelope"
            );
            None
        }
    }
}

fn deliver(handle: &ConnectionHandle, frame: &Frame, result: &mut DeliveryResult) {
    match handle.try_send(frame.clone()) {
        Ok(()) => result.delivered += 1,
        Err(e) => {
            result.failed += 1;
            BroadcastMetrics::record_failure(e);
            tracing::warn!(
                connection_id = %sanitize_for_log(handle.id.as_str()),
                error = %e,
                "Failed to send broadcast to connection"
            );
        }
    }
}
