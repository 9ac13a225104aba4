//! Typed inbound messages and the outbound type vocabulary.

use serde_json::Value;
use thiserror::Error;

use crate::subscriber::Role;

use super::codec::Envelope;

pub const USER_CONNECT: &str = "USER_CONNECT";
pub const ADMIN_NOTICE_UPDATE: &str = "ADMIN_NOTICE_UPDATE";
pub const ADMIN_CONTENT_UPDATE: &str = "ADMIN_CONTENT_UPDATE";
pub const ADMIN_EVENT_UPDATE: &str = "ADMIN_EVENT_UPDATE";
pub const USER_ACTIVITY: &str = "USER_ACTIVITY";

/// `USER_CONNECT` payload
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub user_id: String,
    pub role: Role,
}

/// Payload relayed unchanged by an update message
#[derive(Debug, Clone, PartialEq)]
pub struct RelayPayload(pub Value);

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    UserConnect(Handshake),
    AdminNoticeUpdate(RelayPayload),
    AdminContentUpdate(RelayPayload),
    AdminEventUpdate(RelayPayload),
    UserActivity(RelayPayload),
    Unrecognized { kind: String },
}

/// A recognized message whose payload lacks what its handler needs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("{kind} payload is missing \"{field}\"")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

impl InboundMessage {
    pub fn from_envelope(envelope: Envelope) -> Result<Self, PayloadError> {
        let Envelope { kind, payload } = envelope;
        let message = match kind.as_str() {
            USER_CONNECT => InboundMessage::UserConnect(parse_handshake(&payload)?),
            ADMIN_NOTICE_UPDATE => InboundMessage::AdminNoticeUpdate(RelayPayload(payload)),
            ADMIN_CONTENT_UPDATE => InboundMessage::AdminContentUpdate(RelayPayload(payload)),
            ADMIN_EVENT_UPDATE => InboundMessage::AdminEventUpdate(RelayPayload(payload)),
            USER_ACTIVITY => InboundMessage::UserActivity(RelayPayload(payload)),
            _ => InboundMessage::Unrecognized { kind },
        };
        Ok(message)
    }

    /// Label used for logs and metrics
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::UserConnect(_) => USER_CONNECT,
            InboundMessage::AdminNoticeUpdate(_) => ADMIN_NOTICE_UPDATE,
            InboundMessage::AdminContentUpdate(_) => ADMIN_CONTENT_UPDATE,
            InboundMessage::AdminEventUpdate(_) => ADMIN_EVENT_UPDATE,
            InboundMessage::UserActivity(_) => USER_ACTIVITY,
            InboundMessage::Unrecognized { .. } => "unrecognized",
        }
    }
}

fn parse_handshake(payload: &Value) -> Result<Handshake, PayloadError> {
    let user_id = payload
        .get("userId")
        .and_then(scalar_text)
        .ok_or(PayloadError::MissingField {
            kind: USER_CONNECT,
            field: "userId",
        })?;
    let role = payload
        .get("role")
        .and_then(scalar_text)
        .ok_or(PayloadError::MissingField {
            kind: USER_CONNECT,
            field: "role",
        })?;

    Ok(Handshake {
        user_id,
        role: Role::parse(&role),
    })
}

/// Text form of a scalar JSON value; objects, arrays and null have none
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Types the server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    NoticeUpdate,
    AwarenessContentUpdate,
    EventUpdate,
    CommunityActionUpdate,
    UserActivity,
    NoticeRefresh,
    EventRefresh,
    CommunityActionRefresh,
}

impl OutboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::NoticeUpdate => "NOTICE_UPDATE",
            OutboundKind::AwarenessContentUpdate => "AWARENESS_CONTENT_UPDATE",
            OutboundKind::EventUpdate => "EVENT_UPDATE",
            OutboundKind::CommunityActionUpdate => "COMMUNITY_ACTION_UPDATE",
            OutboundKind::UserActivity => "USER_ACTIVITY",
            OutboundKind::NoticeRefresh => "NOTICE_REFRESH",
            OutboundKind::EventRefresh => "EVENT_REFRESH",
            OutboundKind::CommunityActionRefresh => "COMMUNITY_ACTION_REFRESH",
        }
    }
}

impl AsRef<str> for OutboundKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
