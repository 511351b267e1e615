use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::session::SessionId;

/// Result of a successful leave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Other members remain in the room
    Left,
    /// The session was the last member and the room was removed
    RoomDeleted,
}

/// Bidirectional room membership.
///
/// `members[room]` contains a session iff `session_rooms[session]` contains the
/// room. Rooms exist only while they have at least one member.
#[derive(Debug, Default)]
pub struct RoomIndex {
    members: HashMap<String, HashSet<SessionId>>,
    session_rooms: HashMap<SessionId, HashSet<String>>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a session with no rooms
    pub fn track(&mut self, session_id: &SessionId) {
        self.session_rooms.entry(session_id.clone()).or_default();
    }

    /// Adds the membership edge. Returns false if the session was already a member.
    pub fn join(&mut self, session_id: &SessionId, room: &str) -> bool {
        let rooms = self.session_rooms.entry(session_id.clone()).or_default();
        if !rooms.insert(room.to_string()) {
            debug!(session_id = %session_id, room = %room, "Already a member");
            return false;
        }

        let created = !self.members.contains_key(room);
        self.members
            .entry(room.to_string())
            .or_default()
            .insert(session_id.clone());

        debug!(session_id = %session_id, room = %room, created, "Joined room");
        true
    }

    /// Removes the membership edge, deleting the room once empty.
    /// Returns `None` if the room did not exist or the session was not a member.
    pub fn leave(&mut self, session_id: &SessionId, room: &str) -> Option<LeaveOutcome> {
        let removed = self
            .session_rooms
            .get_mut(session_id)
            .map(|rooms| rooms.remove(room))
            .unwrap_or(false);
        if !removed {
            debug!(session_id = %session_id, room = %room, "Not a member, nothing to leave");
            return None;
        }

        let outcome = match self.members.get_mut(room) {
            Some(members) => {
                members.remove(session_id);
                if members.is_empty() {
                    self.members.remove(room);
                    LeaveOutcome::RoomDeleted
                } else {
                    LeaveOutcome::Left
                }
            }
            None => LeaveOutcome::RoomDeleted,
        };

        debug!(session_id = %session_id, room = %room, ?outcome, "Left room");
        Some(outcome)
    }

    /// Leaves every room and stops tracking the session. Returns the rooms left.
    pub fn leave_all(&mut self, session_id: &SessionId) -> Vec<String> {
        let rooms: Vec<String> = self
            .session_rooms
            .get(session_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();

        for room in &rooms {
            self.leave(session_id, room);
        }
        self.session_rooms.remove(session_id);
        rooms
    }

    /// Members of a room; empty if the room does not exist
    pub fn members_of(&self, room: &str) -> HashSet<SessionId> {
        self.members.get(room).cloned().unwrap_or_default()
    }

    pub fn rooms_of(&self, session_id: &SessionId) -> HashSet<String> {
        self.session_rooms
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room: &str) -> bool {
        self.members.contains_key(room)
    }

    pub fn is_member(&self, session_id: &SessionId, room: &str) -> bool {
        self.members
            .get(room)
            .is_some_and(|members| members.contains(session_id))
    }

    pub fn is_tracked(&self, session_id: &SessionId) -> bool {
        self.session_rooms.contains_key(session_id)
    }

    pub fn room_count(&self) -> usize {
        self.members.len()
    }

    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether both directions of the membership map agree and no room is empty
    pub fn is_consistent(&self) -> bool {
        let forward = self.members.iter().all(|(room, members)| {
            !members.is_empty()
                && members.iter().all(|session_id| {
                    self.session_rooms
                        .get(session_id)
                        .is_some_and(|rooms| rooms.contains(room))
                })
        });
        let backward = self.session_rooms.iter().all(|(session_id, rooms)| {
            rooms.iter().all(|room| {
                self.members
                    .get(room)
                    .is_some_and(|members| members.contains(session_id))
            })
        });
        forward && backward
    }
}
