//! Inbound router: turns decoded client frames into directory bindings or
//! role-targeted relays.

use std::sync::Arc;

use serde_json::Value;

use crate::connection_manager::ConnectionId;
use crate::metrics::WsMessageMetrics;
use crate::notification::{BroadcastDispatcher, DeliveryResult};
use crate::subscriber::{Role, SubscriberDirectory};
use crate::telemetry::sanitize_for_log;

use super::codec;
use super::message::{Handshake, InboundMessage, OutboundKind, RelayPayload};

/// What routing one inbound frame did
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Bound { user_id: String, role: Role },
    Broadcast {
        kind: OutboundKind,
        result: DeliveryResult,
    },
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Decode,
    Payload,
    Unrecognized,
}

/// Classifies inbound frames and hands them to their handler.
///
/// Every failure is logged and swallowed here: nothing a client sends can
/// produce an error for the transport or close the connection.
pub struct InboundRouter {
    directory: Arc<SubscriberDirectory>,
    dispatcher: Arc<BroadcastDispatcher>,
}

impl InboundRouter {
    pub fn new(directory: Arc<SubscriberDirectory>, dispatcher: Arc<BroadcastDispatcher>) -> Self {
        Self {
            directory,
            dispatcher,
        }
    }

    /// Decode and handle one text frame from `connection_id`
    pub fn route(&self, connection_id: &ConnectionId, text: &str) -> RouteOutcome {
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                WsMessageMetrics::record_decode_error();
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Discarding undecodable message"
                );
                return RouteOutcome::Discarded(DiscardReason::Decode);
            }
        };

        let kind = envelope.kind.clone();
        match InboundMessage::from_envelope(envelope) {
            Ok(message) => self.handle(connection_id, message),
            Err(e) => {
                WsMessageMetrics::record_payload_error();
                tracing::warn!(
                    connection_id = %connection_id,
                    message_type = %sanitize_for_log(&kind),
                    error = %e,
                    "Discarding message with malformed payload"
                );
                RouteOutcome::Discarded(DiscardReason::Payload)
            }
        }
    }

    #[tracing::instrument(
        name = "ws.message",
        skip(self, connection_id, message),
        fields(connection_id = %connection_id, message_type = message.kind())
    )]
    pub fn handle(&self, connection_id: &ConnectionId, message: InboundMessage) -> RouteOutcome {
        if !matches!(message, InboundMessage::Unrecognized { .. }) {
            WsMessageMetrics::record_received(message.kind());
        }

        match message {
            InboundMessage::UserConnect(handshake) => self.handle_user_connect(connection_id, handshake),
            // Admin edits go to end users
            InboundMessage::AdminNoticeUpdate(RelayPayload(payload)) => {
                self.relay(Role::User, OutboundKind::NoticeUpdate, &payload)
            }
            InboundMessage::AdminContentUpdate(RelayPayload(payload)) => {
                self.relay(Role::User, OutboundKind::AwarenessContentUpdate, &payload)
            }
            InboundMessage::AdminEventUpdate(RelayPayload(payload)) => {
                self.relay(Role::User, OutboundKind::EventUpdate, &payload)
            }
            // User activity goes to administrators
            InboundMessage::UserActivity(RelayPayload(payload)) => {
                self.relay(Role::Admin, OutboundKind::UserActivity, &payload)
            }
            InboundMessage::Unrecognized { kind } => {
                WsMessageMetrics::record_unrecognized();
                tracing::warn!(
                    message_type = %sanitize_for_log(&kind),
                    "Unknown message type"
                );
                RouteOutcome::Discarded(DiscardReason::Unrecognized)
            }
        }
    }

    fn handle_user_connect(&self, connection_id: &ConnectionId, handshake: Handshake) -> RouteOutcome {
        let Handshake { user_id, role } = handshake;

        tracing::info!(
            user_id = %sanitize_for_log(&user_id),
            role = %sanitize_for_log(role.as_str()),
            "User connected"
        );
        if let Role::Other(_) = role {
            tracing::debug!("Handshake role matches no broadcast audience");
        }

        self.directory
            .bind(connection_id.clone(), user_id.clone(), role.clone());
        RouteOutcome::Bound { user_id, role }
    }

    fn relay(&self, role: Role, kind: OutboundKind, payload: &Value) -> RouteOutcome {
        let result = self.dispatcher.broadcast_to_role(&role, kind.as_str(), payload);
        tracing::info!(
            message_type = kind.as_str(),
            audience = role.as_str(),
            delivered = result.delivered,
            "Relayed update"
        );
        RouteOutcome::Broadcast { kind, result }
    }
}
