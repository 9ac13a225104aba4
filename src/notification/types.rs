use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::subscriber::Role;
use crate::websocket::OutboundKind;

/// Who a broadcast is addressed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// Every live connection, classified or not
    #[default]
    All,
    /// Connections bound to role `user`
    Users,
    /// Connections bound to role `admin`
    Admins,
}

impl Audience {
    pub fn role(&self) -> Option<Role> {
        match self {
            Audience::All => None,
            Audience::Users => Some(Role::User),
            Audience::Admins => Some(Role::Admin),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Users => "users",
            Audience::Admins => "admins",
        }
    }
}

/// Result of one broadcast call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Recipients whose buffer accepted the frame
    pub delivered: usize,
    /// Recipients whose send failed
    pub failed: usize,
    /// Role-bound recipients that were no longer live
    pub skipped: usize,
}

impl DeliveryResult {
    pub fn success(&self) -> bool {
        self.delivered > 0
    }
}

/// CMS entities whose changes are pushed to end users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEntity {
    Notice,
    Event,
    CommunityAction,
    AwarenessContent,
}

impl DomainEntity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "notice" | "notices" => Some(DomainEntity::Notice),
            "event" | "events" => Some(DomainEntity::Event),
            "community_action" | "community_actions" | "community-actions" => {
                Some(DomainEntity::CommunityAction)
            }
            "awareness_content" | "awareness" | "awareness-content" => {
                Some(DomainEntity::AwarenessContent)
            }
            _ => None,
        }
    }

    /// Key the entity is placed under in an update payload
    pub fn payload_key(&self) -> &'static str {
        match self {
            DomainEntity::Notice => "notice",
            DomainEntity::Event => "event",
            DomainEntity::CommunityAction => "communityAction",
            DomainEntity::AwarenessContent => "content",
        }
    }

    pub fn update_kind(&self) -> OutboundKind {
        match self {
            DomainEntity::Notice => OutboundKind::NoticeUpdate,
            DomainEntity::Event => OutboundKind::EventUpdate,
            DomainEntity::CommunityAction => OutboundKind::CommunityActionUpdate,
            DomainEntity::AwarenessContent => OutboundKind::AwarenessContentUpdate,
        }
    }

    /// Awareness content has no list refresh signal
    pub fn refresh_kind(&self) -> Option<OutboundKind> {
        match self {
            DomainEntity::Notice => Some(OutboundKind::NoticeRefresh),
            DomainEntity::Event => Some(OutboundKind::EventRefresh),
            DomainEntity::CommunityAction => Some(OutboundKind::CommunityActionRefresh),
            DomainEntity::AwarenessContent => None,
        }
    }
}

/// Statistics for the broadcast dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Total broadcast calls
    pub total_broadcasts: AtomicU64,
    pub all_broadcasts: AtomicU64,
    pub user_broadcasts: AtomicU64,
    pub admin_broadcasts: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_skipped: AtomicU64,
}

impl DispatcherStats {
    /// `role` is `None` for an unfiltered broadcast
    pub(crate) fn record(&self, role: Option<&Role>, result: &DeliveryResult) {
        self.total_broadcasts.fetch_add(1, Ordering::Relaxed);
        let counter = match role {
            None => Some(&self.all_broadcasts),
            Some(Role::User) => Some(&self.user_broadcasts),
            Some(Role::Admin) => Some(&self.admin_broadcasts),
            Some(Role::Other(_)) => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.total_delivered
            .fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.total_failed
            .fetch_add(result.failed as u64, Ordering::Relaxed);
        self.total_skipped
            .fetch_add(result.skipped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            all_broadcasts: self.all_broadcasts.load(Ordering::Relaxed),
            user_broadcasts: self.user_broadcasts.load(Ordering::Relaxed),
            admin_broadcasts: self.admin_broadcasts.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_skipped: self.total_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_broadcasts: u64,
    pub all_broadcasts: u64,
    pub user_broadcasts: u64,
    pub admin_broadcasts: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
}
