//! Presence registry
//!
//! Tracks which user each identified connection belongs to and the user's
//! current activity label. A user has at most one connection at a time; a
//! later `register` for the same user replaces the earlier binding.
//!
//! The registry itself does no locking. [`super::state::WebSocketState`]
//! wraps it in a lock and each gateway operation takes it exactly once.

use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Activity label given to a freshly registered user
pub const DEFAULT_ACTIVITY: &str = "Idle";

/// Side effects of a [`PresenceRegistry::register`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Connection that was bound to this user before and no longer is
    pub superseded: Option<Uuid>,

    /// User this connection was previously identified as, now dropped
    pub released: Option<String>,
}

/// In-memory map of online users
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections_by_user: BTreeMap<String, Uuid>,
    users_by_connection: HashMap<Uuid, String>,
    activities: BTreeMap<String, String>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to `connection_id`
    ///
    /// The activity label is reset to [`DEFAULT_ACTIVITY`] only when the user
    /// was not registered already.
    pub fn register(&mut self, user_id: &str, connection_id: Uuid) -> Registration {
        let released = self
            .users_by_connection
            .get(&connection_id)
            .filter(|previous| previous.as_str() != user_id)
            .cloned();
        if let Some(previous) = &released {
            self.connections_by_user.remove(previous);
            self.activities.remove(previous);
        }

        let superseded = self
            .connections_by_user
            .insert(user_id.to_string(), connection_id)
            .filter(|previous| *previous != connection_id);
        if let Some(previous) = superseded {
            self.users_by_connection.remove(&previous);
        }

        self.users_by_connection
            .insert(connection_id, user_id.to_string());
        self.activities
            .entry(user_id.to_string())
            .or_insert_with(|| DEFAULT_ACTIVITY.to_string());

        Registration {
            superseded,
            released,
        }
    }

    /// Set the activity label; returns false when the user is not online
    pub fn update_activity(&mut self, user_id: &str, activity: &str) -> bool {
        match self.activities.get_mut(user_id) {
            Some(current) => {
                *current = activity.to_string();
                true
            }
            None => false,
        }
    }

    /// Drop whichever user is bound to `connection_id` and return it
    pub fn unregister(&mut self, connection_id: &Uuid) -> Option<String> {
        let user_id = self.users_by_connection.remove(connection_id)?;
        self.connections_by_user.remove(&user_id);
        self.activities.remove(&user_id);
        Some(user_id)
    }

    /// All online user ids, sorted
    pub fn online_user_ids(&self) -> Vec<String> {
        self.connections_by_user.keys().cloned().collect()
    }

    /// All `(user_id, activity)` pairs, sorted by user id
    pub fn activities(&self) -> Vec<(String, String)> {
        self.activities
            .iter()
            .map(|(user, activity)| (user.clone(), activity.clone()))
            .collect()
    }

    pub fn connection_for(&self, user_id: &str) -> Option<Uuid> {
        self.connections_by_user.get(user_id).copied()
    }

    pub fn user_for(&self, connection_id: &Uuid) -> Option<&str> {
        self.users_by_connection
            .get(connection_id)
            .map(String::as_str)
    }

    pub fn activity_of(&self, user_id: &str) -> Option<&str> {
        self.activities.get(user_id).map(String::as_str)
    }

    /// Number of online users
    pub fn len(&self) -> usize {
        self.connections_by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections_by_user.is_empty()
    }
}
