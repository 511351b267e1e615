use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::auth::Role;
use crate::event::{dispatch_domain_event, Broadcaster, DeliveryReport, EventRouter, RouteError};
use crate::room::{LeaveOutcome, RoomIndex};
use crate::session::{Outbound, Session, SessionId, SessionRegistry};
use crate::websockets::{frame_types, Frame, SERVER_ORIGIN};

/// Counts exposed for health reporting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub sessions: usize,
    pub rooms: usize,
}

/// Owner of every session and room membership.
///
/// All mutation goes through `&mut self`; the actor in `handle.rs` is the
/// only holder in a running server, which serializes every operation.
#[derive(Default)]
pub struct Coordinator {
    sessions: SessionRegistry,
    rooms: RoomIndex,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection, confirms it and optionally joins an initial room
    pub fn connect(
        &mut self,
        outbound: Outbound,
        user_id: &str,
        user_role: Role,
        room: Option<&str>,
    ) -> SessionId {
        let session_id = self.sessions.create(outbound, user_id, user_role);
        self.rooms.track(&session_id);

        let room = room.filter(|room| !room.is_empty());
        self.send_to(&session_id, &Frame::connect(&session_id, room));
        if let Some(room) = room {
            self.join_room(&session_id, room);
        }

        session_id
    }

    /// Tears down a session; the second call for the same id is a no-op
    pub fn disconnect(&mut self, session_id: &SessionId) -> bool {
        let Some(user_id) = self.sessions.get(session_id).map(|s| s.user_id.clone()) else {
            debug!(session_id = %session_id, "Disconnect for unknown session ignored");
            return false;
        };

        let rooms = self.rooms.leave_all(session_id);
        for room in &rooms {
            self.notify_members(frame_types::USER_LEFT, room, session_id, &user_id);
        }
        self.sessions.remove(session_id);

        info!(
            session_id = %session_id,
            user_id = %user_id,
            rooms_left = rooms.len(),
            "Session destroyed"
        );
        true
    }

    /// Joins a room, notifying the existing members. Idempotent.
    pub fn join_room(&mut self, session_id: &SessionId, room: &str) -> bool {
        let Some(user_id) = self.sessions.get(session_id).map(|s| s.user_id.clone()) else {
            warn!(session_id = %session_id, room = %room, "Join for unknown session");
            return false;
        };

        if self.rooms.join(session_id, room) {
            self.notify_members(frame_types::USER_JOINED, room, session_id, &user_id);
        }
        true
    }

    /// Leaves a room, notifying the remaining members. False if not a member.
    pub fn leave_room(&mut self, session_id: &SessionId, room: &str) -> bool {
        let Some(user_id) = self.sessions.get(session_id).map(|s| s.user_id.clone()) else {
            return false;
        };

        match self.rooms.leave(session_id, room) {
            Some(LeaveOutcome::Left) => {
                self.notify_members(frame_types::USER_LEFT, room, session_id, &user_id);
                true
            }
            Some(LeaveOutcome::RoomDeleted) => true,
            None => false,
        }
    }

    /// Routes one inbound frame, answering routing errors to the sender only
    pub fn handle_frame(&mut self, session_id: &SessionId, raw: &str) {
        if !self.sessions.contains(session_id) {
            debug!(session_id = %session_id, "Frame from unknown session dropped");
            return;
        }

        if let Err(e) = EventRouter::route(self, session_id, raw) {
            warn!(session_id = %session_id, error = %e, "Rejected inbound frame");
            self.send_to(session_id, &Frame::error(e.to_string()));
        }
    }

    /// Server-originated delivery to one room
    pub fn deliver_to_room(
        &self,
        room: &str,
        frame_type: &str,
        payload: Map<String, Value>,
        exclude: &HashSet<SessionId>,
    ) -> DeliveryReport {
        let frame = Frame::new(frame_type, payload).stamped(SERVER_ORIGIN);
        self.broadcaster().send_to_room(room, &frame, exclude)
    }

    /// Server-originated delivery to every session
    pub fn deliver_to_all(
        &self,
        frame_type: &str,
        payload: Map<String, Value>,
        exclude: &HashSet<SessionId>,
    ) -> DeliveryReport {
        let frame = Frame::new(frame_type, payload).stamped(SERVER_ORIGIN);
        self.broadcaster().broadcast_all(&frame, exclude)
    }

    /// Server-originated domain event routed by the implicit fan-out policy
    pub fn publish_event(&self, frame_type: &str, payload: Map<String, Value>) -> Result<DeliveryReport, RouteError> {
        dispatch_domain_event(self, &Frame::new(frame_type, payload), SERVER_ORIGIN)
    }

    /// Best-effort single-recipient send
    pub fn send_to(&self, session_id: &SessionId, frame: &Frame) {
        if let Err(e) = self.broadcaster().send_to(session_id, frame) {
            debug!(error = %e, frame_type = %frame.frame_type, "Direct send dropped");
        }
    }

    pub fn broadcaster(&self) -> Broadcaster<'_> {
        Broadcaster::new(&self.sessions, &self.rooms)
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn rooms(&self) -> &RoomIndex {
        &self.rooms
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            sessions: self.sessions.len(),
            rooms: self.rooms.room_count(),
        }
    }

    /// Membership agrees in both directions and only references live sessions
    pub fn is_consistent(&self) -> bool {
        self.rooms.is_consistent()
            && self.sessions.ids().all(|id| self.rooms.is_tracked(id))
            && self.rooms.room_names().iter().all(|room| {
                self.rooms
                    .members_of(room)
                    .iter()
                    .all(|id| self.sessions.contains(id))
            })
    }

    fn notify_members(&self, frame_type: &str, room: &str, session_id: &SessionId, user_id: &str) {
        let frame = Frame::membership(frame_type, room, session_id, user_id);
        let exclude = HashSet::from([session_id.clone()]);
        self.broadcaster().send_to_room(room, &frame, &exclude);
    }
}
