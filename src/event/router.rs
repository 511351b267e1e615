use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, instrument};

use super::broadcast::DeliveryReport;
use super::errors::RouteError;
use crate::coordinator::Coordinator;
use crate::session::SessionId;
use crate::websockets::{frame_types, Frame};

/// Room every domain event without an explicit room reaches
pub const ADMIN_ROOM: &str = "admin";
pub const DEPARTMENT_ROOM_PREFIX: &str = "department:";

/// Dispatches inbound realtime frames to room membership and fan-out
pub struct EventRouter;

impl EventRouter {
    /// Handles one raw frame from `sender`. Errors are meant for the sender only.
    #[instrument(skip(coordinator, sender, raw), fields(sender = %sender))]
    pub fn route(coordinator: &mut Coordinator, sender: &SessionId, raw: &str) -> Result<(), RouteError> {
        let frame = Frame::parse(raw).map_err(|e| RouteError::MalformedMessage(e.to_string()))?;
        debug!(frame_type = %frame.frame_type, "Routing frame");

        match frame.frame_type.as_str() {
            frame_types::JOIN_ROOM => {
                let room = required_room(&frame)?;
                let success = coordinator.join_room(sender, room);
                coordinator.send_to(sender, &Frame::room_ack(frame_types::JOIN_ROOM, room, success));
            }
            frame_types::LEAVE_ROOM => {
                let room = required_room(&frame)?;
                let success = coordinator.leave_room(sender, room);
                coordinator.send_to(sender, &Frame::room_ack(frame_types::LEAVE_ROOM, room, success));
            }
            frame_types::MESSAGE => {
                let stamped = frame.stamped(sender.as_str());
                let broadcaster = coordinator.broadcaster();
                match optional_room(&frame)? {
                    Some(room) => {
                        ensure_room_exists(coordinator, room)?;
                        broadcaster.send_to_room(room, &stamped, &HashSet::new());
                    }
                    None => {
                        broadcaster.broadcast_all(&stamped, &HashSet::new());
                    }
                }
            }
            _ => {
                dispatch_domain_event(coordinator, &frame, sender.as_str())?;
            }
        }

        Ok(())
    }
}

/// Delivers a domain event (attendance, employee, biometric changes, ...).
///
/// With an explicit `room` the event goes to that room only. Otherwise it goes
/// to the admin room and, when the payload names a department, to that
/// department's room minus anyone the admin room already reached.
pub fn dispatch_domain_event(
    coordinator: &Coordinator,
    frame: &Frame,
    origin: &str,
) -> Result<DeliveryReport, RouteError> {
    let stamped = frame.stamped(origin);
    let broadcaster = coordinator.broadcaster();

    if let Some(room) = optional_room(frame)? {
        ensure_room_exists(coordinator, room)?;
        return Ok(broadcaster.send_to_room(room, &stamped, &HashSet::new()));
    }

    let mut report = broadcaster.send_to_room(ADMIN_ROOM, &stamped, &HashSet::new());
    if let Some(department) = department_id(&frame.payload) {
        let already_reached = coordinator.rooms().members_of(ADMIN_ROOM);
        let department_room = format!("{DEPARTMENT_ROOM_PREFIX}{department}");
        report += broadcaster.send_to_room(&department_room, &stamped, &already_reached);
    }

    debug!(
        frame_type = %frame.frame_type,
        delivered = report.delivered,
        "Domain event fanned out"
    );
    Ok(report)
}

fn required_room(frame: &Frame) -> Result<&str, RouteError> {
    optional_room(frame)?.ok_or_else(|| {
        RouteError::MalformedMessage(format!("{} requires a string room", frame.frame_type))
    })
}

fn optional_room(frame: &Frame) -> Result<Option<&str>, RouteError> {
    match frame.payload.get("room") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(room)) if !room.is_empty() => Ok(Some(room.as_str())),
        Some(_) => Err(RouteError::MalformedMessage(
            "room must be a non-empty string".to_string(),
        )),
    }
}

fn ensure_room_exists(coordinator: &Coordinator, room: &str) -> Result<(), RouteError> {
    if coordinator.rooms().contains_room(room) {
        Ok(())
    } else {
        Err(RouteError::UnknownRoom(room.to_string()))
    }
}

fn department_id(payload: &Map<String, Value>) -> Option<String> {
    match payload.get("departmentId")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
