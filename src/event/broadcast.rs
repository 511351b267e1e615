use serde::Serialize;
use std::collections::HashSet;
use std::ops::AddAssign;
use tracing::{debug, warn};

use super::errors::DeliveryError;
use crate::room::RoomIndex;
use crate::session::{SessionId, SessionRegistry};
use crate::websockets::Frame;

/// How many recipients a fan-out reached
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Recipients whose connection was no longer open
    pub skipped: usize,
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
    }
}

/// Fire-and-forget fan-out over a snapshot of the registry and room index.
///
/// Each frame is serialized once. A failed send is logged and never stops
/// delivery to the remaining recipients.
pub struct Broadcaster<'a> {
    sessions: &'a SessionRegistry,
    rooms: &'a RoomIndex,
}

impl<'a> Broadcaster<'a> {
    pub fn new(sessions: &'a SessionRegistry, rooms: &'a RoomIndex) -> Self {
        Self { sessions, rooms }
    }

    /// Sends one frame to a single session
    pub fn send_to(&self, session_id: &SessionId, frame: &Frame) -> Result<(), DeliveryError> {
        match serialize(frame) {
            Some(json) => self.deliver(session_id, json),
            None => Ok(()),
        }
    }

    /// Sends to every member of `room` not listed in `exclude`
    pub fn send_to_room(&self, room: &str, frame: &Frame, exclude: &HashSet<SessionId>) -> DeliveryReport {
        let Some(json) = serialize(frame) else {
            return DeliveryReport::default();
        };
        let members = self.rooms.members_of(room);
        let report = self.deliver_all(members.iter(), &json, exclude);

        debug!(
            room = %room,
            frame_type = %frame.frame_type,
            delivered = report.delivered,
            skipped = report.skipped,
            "Room broadcast"
        );
        report
    }

    /// Sends to every live session not listed in `exclude`, regardless of rooms
    pub fn broadcast_all(&self, frame: &Frame, exclude: &HashSet<SessionId>) -> DeliveryReport {
        let Some(json) = serialize(frame) else {
            return DeliveryReport::default();
        };
        let report = self.deliver_all(self.sessions.ids(), &json, exclude);

        debug!(
            frame_type = %frame.frame_type,
            delivered = report.delivered,
            skipped = report.skipped,
            "Global broadcast"
        );
        report
    }

    fn deliver_all<'b>(
        &self,
        recipients: impl Iterator<Item = &'b SessionId>,
        json: &str,
        exclude: &HashSet<SessionId>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for session_id in recipients.filter(|id| !exclude.contains(*id)) {
            match self.deliver(session_id, json.to_string()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(error = %e, "Skipping recipient");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    fn deliver(&self, session_id: &SessionId, json: String) -> Result<(), DeliveryError> {
        let outbound = self
            .sessions
            .open_outbound(session_id)
            .ok_or_else(|| DeliveryError::ConnectionClosed(session_id.clone()))?;
        outbound
            .send(json)
            .map_err(|_| DeliveryError::ConnectionClosed(session_id.clone()))
    }
}

fn serialize(frame: &Frame) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(frame_type = %frame.frame_type, error = %e, "Failed to serialize frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use serde_json::Map;
    use tokio::sync::mpsc;

    struct Fixture {
        sessions: SessionRegistry,
        rooms: RoomIndex,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                sessions: SessionRegistry::new(),
                rooms: RoomIndex::new(),
            }
        }

        fn connect(&mut self, user: &str) -> (SessionId, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = self.sessions.create(tx, user, Role::Employee);
            self.rooms.track(&id);
            (id, rx)
        }

        fn broadcaster(&self) -> Broadcaster<'_> {
            Broadcaster::new(&self.sessions, &self.rooms)
        }
    }

    fn ping() -> Frame {
        Frame::new("ping", Map::new())
    }

    #[test]
    fn test_send_to_room_respects_exclusions_and_membership() {
        let mut fx = Fixture::new();
        let (a, mut rx_a) = fx.connect("a");
        let (b, mut rx_b) = fx.connect("b");
        let (_c, mut rx_c) = fx.connect("c");
        fx.rooms.join(&a, "team1");
        fx.rooms.join(&b, "team1");

        let exclude = HashSet::from([b.clone()]);
        let report = fx.broadcaster().send_to_room("team1", &ping(), &exclude);

        assert_eq!(report, DeliveryReport { delivered: 1, skipped: 0 });
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_closed_connections_are_skipped_without_aborting() {
        let mut fx = Fixture::new();
        let (a, rx_a) = fx.connect("a");
        let (b, mut rx_b) = fx.connect("b");
        fx.rooms.join(&a, "team1");
        fx.rooms.join(&b, "team1");
        drop(rx_a);

        let report = fx.broadcaster().send_to_room("team1", &ping(), &HashSet::new());

        assert_eq!(report, DeliveryReport { delivered: 1, skipped: 1 });
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_all_ignores_rooms() {
        let mut fx = Fixture::new();
        let (a, mut rx_a) = fx.connect("a");
        let (_b, mut rx_b) = fx.connect("b");
        fx.rooms.join(&a, "team1");

        let report = fx.broadcaster().broadcast_all(&ping(), &HashSet::new());

        assert_eq!(report.delivered, 2);
        let received: Frame = serde_json::from_str(&rx_a.try_recv().unwrap()).unwrap();
        assert_eq!(received.frame_type, "ping");
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_missing_room_delivers_nothing() {
        let mut fx = Fixture::new();
        let (_a, mut rx_a) = fx.connect("a");

        let report = fx.broadcaster().send_to_room("ghost", &ping(), &HashSet::new());
        assert_eq!(report, DeliveryReport::default());
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_send_to_closed_session_reports_connection_closed() {
        let mut fx = Fixture::new();
        let (a, rx_a) = fx.connect("a");
        drop(rx_a);

        assert_eq!(
            fx.broadcaster().send_to(&a, &ping()),
            Err(DeliveryError::ConnectionClosed(a.clone()))
        );
    }

    #[test]
    fn test_report_accumulates() {
        let mut total = DeliveryReport { delivered: 1, skipped: 0 };
        total += DeliveryReport { delivered: 2, skipped: 1 };
        assert_eq!(total, DeliveryReport { delivered: 3, skipped: 1 });
    }
}
