use thiserror::Error;

use crate::session::SessionId;

/// Non-fatal problems with an inbound frame; reported to the sender only
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown room: {0}")]
    UnknownRoom(String),
}

/// Failure to hand a frame to one recipient; always swallowed by the caller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Connection closed for session {0}")]
    ConnectionClosed(SessionId),
}
