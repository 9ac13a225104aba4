//! Typed notification entry points for CMS entity changes and user activity.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::telemetry::sanitize_for_log;
use crate::websocket::OutboundKind;

use super::dispatcher::BroadcastDispatcher;
use super::types::{DeliveryResult, DomainEntity};

/// Payload sent with every list refresh signal
const REFRESH_PAYLOAD: &str = "refresh";

/// Typed entry points for CMS domain events.
///
/// Entity changes and refresh signals go to end users; user activity goes to
/// administrators.
pub struct NotificationPublisher {
    dispatcher: Arc<BroadcastDispatcher>,
}

impl NotificationPublisher {
    pub fn new(dispatcher: Arc<BroadcastDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Push a created/updated/deleted entity to every bound user.
    ///
    /// Payload: `{ <entity key>: data, "action": action, "timestamp": ms }`.
    pub fn entity_updated(&self, entity: DomainEntity, data: Value, action: &str) -> DeliveryResult {
        let mut payload = Map::new();
        payload.insert(entity.payload_key().to_string(), data);
        payload.insert("action".to_string(), Value::String(action.to_string()));
        payload.insert("timestamp".to_string(), json!(Utc::now().timestamp_millis()));

        let kind = entity.update_kind();
        let result = self
            .dispatcher
            .broadcast_to_users(kind.as_str(), &Value::Object(payload));

        tracing::info!(
            message_type = kind.as_str(),
            action = %sanitize_for_log(action),
            delivered = result.delivered,
            "Entity update broadcast to users"
        );
        result
    }

    /// Tell users to reload the entity list. `None` when the entity has no
    /// refresh signal.
    pub fn entity_list_refresh(&self, entity: DomainEntity) -> Option<DeliveryResult> {
        let kind = entity.refresh_kind()?;
        let result = self
            .dispatcher
            .broadcast_to_users(kind.as_str(), &Value::String(REFRESH_PAYLOAD.to_string()));

        tracing::info!(
            message_type = kind.as_str(),
            delivered = result.delivered,
            "List refresh broadcast to users"
        );
        Some(result)
    }

    /// Notify administrators of something a user did
    pub fn user_activity(&self, user_id: &str, activity: &str) -> DeliveryResult {
        let payload = json!({
            "userId": user_id,
            "activity": activity,
            "timestamp": Utc::now().timestamp_millis(),
        });
        let result = self
            .dispatcher
            .broadcast_to_admins(OutboundKind::UserActivity.as_str(), &payload);

        tracing::info!(
            user_id = %sanitize_for_log(user_id),
            activity = %sanitize_for_log(activity),
            delivered = result.delivered,
            "User activity sent to admins"
        );
        result
    }
}
