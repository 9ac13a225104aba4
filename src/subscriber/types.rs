//! Subscriber roles and identities

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::connection_manager::ConnectionId;

/// Role a client declares in its handshake.
///
/// Matching is exact and case-sensitive. Anything other than `user` or
/// `admin` is kept verbatim in [`Role::Other`] and never matches a
/// role-targeted broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "user" => Role::User,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::parse(raw)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

/// Identity bound to a connection by its latest handshake
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberIdentity {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub role: Role,
}

/// Bound identities grouped by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub admins: usize,
    pub users: usize,
    pub other: usize,
}

impl RoleCounts {
    pub fn total(&self) -> usize {
        self.admins + self.users + self.other
    }
}
