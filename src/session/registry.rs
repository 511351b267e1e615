use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::models::{Session, SessionId};
use crate::auth::Role;

/// Outbound half of a realtime connection; the socket task owns the receiver
pub type Outbound = mpsc::UnboundedSender<String>;

struct SessionEntry {
    session: Session,
    outbound: Outbound,
}

/// Table of live sessions and their outbound channels.
///
/// Only the coordinator holds one, so no interior locking is needed. Room
/// membership is tracked by the room index, not here.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new session under a freshly generated id
    pub fn create(&mut self, outbound: Outbound, user_id: &str, user_role: Role) -> SessionId {
        let mut session_id = SessionId::generate();
        while self.sessions.contains_key(&session_id) {
            session_id = SessionId::generate();
        }

        let session = Session {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
            user_role,
            connected_at: Utc::now(),
        };
        self.sessions
            .insert(session_id.clone(), SessionEntry { session, outbound });

        info!(session_id = %session_id, user_id = %user_id, role = %user_role, "Session created");
        session_id
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id).map(|entry| &entry.session)
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Removes the session record; `None` if it was already gone
    pub fn remove(&mut self, session_id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(session_id).map(|entry| entry.session);
        match &removed {
            Some(session) => {
                info!(session_id = %session_id, user_id = %session.user_id, "Session removed")
            }
            None => debug!(session_id = %session_id, "Session already removed"),
        }
        removed
    }

    /// Outbound channel of a session that is still open
    pub fn open_outbound(&self, session_id: &SessionId) -> Option<&Outbound> {
        self.sessions
            .get(session_id)
            .map(|entry| &entry.outbound)
            .filter(|outbound| !outbound.is_closed())
    }

    pub fn ids(&self) -> impl Iterator<Item = &SessionId> {
        self.sessions.keys()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_create_and_get_session() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = registry.create(tx, "emp-1", Role::Employee);
        let session = registry.get(&id).unwrap();

        assert_eq!(session.session_id, id);
        assert_eq!(session.user_id, "emp-1");
        assert_eq!(session.user_role, Role::Employee);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = SessionRegistry::new();
        let mut seen = HashSet::new();

        for _ in 0..100 {
            let (tx, _rx) = mpsc::unbounded_channel();
            let id = registry.create(tx, "emp-1", Role::Employee);
            registry.remove(&id);
            assert!(seen.insert(id));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.create(tx, "emp-1", Role::Employee);

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_open_outbound_skips_closed_channels() {
        let mut registry = SessionRegistry::new();
        let (open_tx, _open_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        drop(closed_rx);

        let open = registry.create(open_tx, "a", Role::Admin);
        let closed = registry.create(closed_tx, "b", Role::Manager);

        assert!(registry.open_outbound(&open).is_some());
        assert!(registry.open_outbound(&closed).is_none());
        assert!(registry.contains(&closed));
    }
}
