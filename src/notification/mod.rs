//! Broadcast dispatching and the typed domain-event publisher.

mod dispatcher;
mod publisher;
mod types;

pub use dispatcher::BroadcastDispatcher;
pub use publisher::NotificationPublisher;
pub use types::{Audience, DeliveryResult, DispatcherStatsSnapshot, DomainEntity};
