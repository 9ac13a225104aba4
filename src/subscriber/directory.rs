//! Subscriber directory: connection id to declared identity.

use dashmap::DashMap;

use crate::connection_manager::ConnectionId;

use super::types::{Role, RoleCounts, SubscriberIdentity};

/// Maps connection ids to the identity declared in their handshake.
///
/// Nothing here can fail: handshake data is untrusted and stored as given.
pub struct SubscriberDirectory {
    /// connection_id -> SubscriberIdentity
    identities: DashMap<ConnectionId, SubscriberIdentity>,
}

impl SubscriberDirectory {
    pub fn new() -> Self {
        Self {
            identities: DashMap::new(),
        }
    }

    /// Insert or overwrite the identity for a connection (last write wins)
    pub fn bind(&self, connection_id: ConnectionId, user_id: impl Into<String>, role: Role) {
        let identity = SubscriberIdentity {
            connection_id: connection_id.clone(),
            user_id: user_id.into(),
            role,
        };
        self.identities.insert(connection_id, identity);
    }

    pub fn unbind(&self, connection_id: &ConnectionId) -> Option<SubscriberIdentity> {
        self.identities
            .remove(connection_id)
            .map(|(_, identity)| identity)
    }

    /// Connections currently bound to `role`.
    ///
    /// The map is walked lazily as the iterator is consumed; call again for a
    /// fresh pass.
    pub fn connection_ids_with_role<'a>(
        &'a self,
        role: &'a Role,
    ) -> impl Iterator<Item = ConnectionId> + 'a {
        self.identities
            .iter()
            .filter(move |entry| &entry.value().role == role)
            .map(|entry| entry.key().clone())
    }

    pub fn identity(&self, connection_id: &ConnectionId) -> Option<SubscriberIdentity> {
        self.identities.get(connection_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn role_counts(&self) -> RoleCounts {
        let mut counts = RoleCounts::default();
        for entry in self.identities.iter() {
            match entry.value().role {
                Role::Admin => counts.admins += 1,
                Role::User => counts.users += 1,
                Role::Other(_) => counts.other += 1,
            }
        }
        counts
    }

    /// Keep only identities whose connection id satisfies `keep`,
    /// returning how many were dropped
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&ConnectionId) -> bool,
    {
        let before = self.identities.len();
        self.identities.retain(|id, _| keep(id));
        before.saturating_sub(self.identities.len())
    }

    pub fn clear(&self) -> usize {
        let count = self.identities.len();
        self.identities.clear();
        count
    }
}

impl Default for SubscriberDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(directory: &SubscriberDirectory, role: Role) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = directory.connection_ids_with_role(&role).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_bind_and_lookup_by_role() {
        let directory = SubscriberDirectory::new();
        directory.bind(ConnectionId::from("a"), "u1", Role::Admin);
        directory.bind(ConnectionId::from("b"), "u2", Role::User);
        directory.bind(ConnectionId::from("c"), "u3", Role::User);

        assert_eq!(ids(&directory, Role::Admin), vec![ConnectionId::from("a")]);
        assert_eq!(
            ids(&directory, Role::User),
            vec![ConnectionId::from("b"), ConnectionId::from("c")]
        );
    }

    #[test]
    fn test_rebind_last_write_wins() {
        let directory = SubscriberDirectory::new();
        let id = ConnectionId::from("a");
        directory.bind(id.clone(), "u1", Role::Admin);
        directory.bind(id.clone(), "u1", Role::User);

        assert!(ids(&directory, Role::Admin).is_empty());
        assert_eq!(ids(&directory, Role::User), vec![id.clone()]);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.identity(&id).unwrap().role, Role::User);
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let directory = SubscriberDirectory::new();
        let id = ConnectionId::from("a");
        directory.bind(id.clone(), "u1", Role::Admin);

        assert!(directory.unbind(&id).is_some());
        assert!(directory.unbind(&id).is_none());
        assert!(ids(&directory, Role::Admin).is_empty());
    }

    #[test]
    fn test_unknown_role_matches_nothing() {
        let directory = SubscriberDirectory::new();
        directory.bind(ConnectionId::from("a"), "u1", Role::parse("superuser"));

        assert!(ids(&directory, Role::Admin).is_empty());
        assert!(ids(&directory, Role::User).is_empty());
        assert_eq!(directory.role_counts().other, 1);
    }

    #[test]
    fn test_sequence_is_restartable_and_evaluated_late() {
        let directory = SubscriberDirectory::new();
        directory.bind(ConnectionId::from("a"), "u1", Role::User);
        assert_eq!(directory.connection_ids_with_role(&Role::User).count(), 1);

        directory.bind(ConnectionId::from("b"), "u2", Role::User);
        assert_eq!(directory.connection_ids_with_role(&Role::User).count(), 2);
    }

    #[test]
    fn test_retain_drops_unknown_connections() {
        let directory = SubscriberDirectory::new();
        directory.bind(ConnectionId::from("a"), "u1", Role::User);
        directory.bind(ConnectionId::from("b"), "u2", Role::Admin);

        let dropped = directory.retain(|id| id.as_str() == "a");
        assert_eq!(dropped, 1);
        assert_eq!(
            directory.role_counts(),
            RoleCounts {
                admins: 0,
                users: 1,
                other: 0
            }
        );
    }
}
