//! Inbound triggers from backend services.

mod http;

pub use http::{
    broadcast, entity_refresh, entity_update, user_activity, BroadcastRequest, DeliveryResponse,
    EntityUpdateRequest, UserActivityRequest,
};
