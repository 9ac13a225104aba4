//! WebSocket endpoint, envelope codec and inbound message routing.

pub mod codec;
mod handler;
mod message;
mod router;

pub use codec::{DecodeError, Envelope};
pub use handler::ws_handler;
pub use message::{
    Handshake, InboundMessage, OutboundKind, PayloadError, RelayPayload, ADMIN_CONTENT_UPDATE,
    ADMIN_EVENT_UPDATE, ADMIN_NOTICE_UPDATE, USER_ACTIVITY, USER_CONNECT,
};
pub use router::{DiscardReason, InboundRouter, RouteOutcome};
