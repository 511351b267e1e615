use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::socket::Connection;
use crate::auth::{Claims, Role};
use crate::shared::{AppError, AppState};

/// Query parameters of the realtime endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub token: String,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub room: Option<String>,
}

impl ConnectParams {
    /// Identity claimed in the query must agree with the verified credential
    fn check_identity(&self, claims: &Claims) -> Result<(), AppError> {
        if let Some(user_id) = self.user_id.as_deref() {
            if user_id != claims.subject_id {
                return Err(AppError::Unauthorized(
                    "userId does not match credential".to_string(),
                ));
            }
        }
        if let Some(user_role) = self.user_role.as_deref() {
            let role: Role = user_role
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Unknown role: {user_role}")))?;
            if role != claims.role {
                return Err(AppError::Unauthorized(
                    "userRole does not match credential".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// WebSocket endpoint
/// GET /ws?token=..&userId=..&userRole=..&room=..
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    let claims = app_state.credentials.verify(&params.token).map_err(|e| {
        warn!(error = %e, "Rejecting WebSocket connection with invalid credential");
        e
    })?;
    params.check_identity(&claims)?;

    info!(
        user_id = %claims.subject_id,
        role = %claims.role,
        room = ?params.room,
        "WebSocket authentication successful"
    );

    let room = params.room;
    Ok(ws.on_upgrade(move |socket| handle_websocket_connection(socket, claims, room, app_state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: WebSocket,
    claims: Claims,
    room: Option<String>,
    app_state: AppState,
) {
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let session_id = match app_state
        .coordinator
        .connect(&claims.subject_id, claims.role, room, outbound_sender)
        .await
    {
        Ok(session_id) => session_id,
        Err(e) => {
            warn!(user_id = %claims.subject_id, error = %e, "Could not register session");
            return;
        }
    };

    let connection = Connection::new(
        session_id.clone(),
        Box::new(socket),
        outbound_receiver,
        Arc::new(app_state.coordinator.clone()),
    );

    match connection.run().await {
        Ok(()) => info!(session_id = %session_id, "WebSocket connection closed cleanly"),
        Err(e) => warn!(session_id = %session_id, error = %e, "WebSocket connection error"),
    }

    if let Err(e) = app_state.coordinator.disconnect(&session_id).await {
        warn!(session_id = %session_id, error = %e, "Session teardown failed");
    }
}
