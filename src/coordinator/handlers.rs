use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::auth::{BearerToken, Role};
use crate::event::DeliveryReport;
use crate::session::SessionId;
use crate::shared::{AppError, AppState};

/// Body for server-originated deliveries
#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub exclude: Vec<SessionId>,
}

impl DeliveryRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.frame_type.trim().is_empty() {
            return Err(AppError::BadRequest("type must not be empty".to_string()));
        }
        Ok(())
    }

    fn exclusions(&self) -> HashSet<SessionId> {
        self.exclude.iter().cloned().collect()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MembersResponse {
    pub room: String,
    pub members: Vec<SessionId>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.coordinator.stats().await?;
    Ok(Json(json!({
        "status": "ok",
        "sessions": stats.sessions,
        "rooms": stats.rooms,
    })))
}

/// HTTP handler delivering a frame to one room
///
/// POST /realtime/rooms/:room/events (manager or above)
#[instrument(name = "deliver_to_room", skip(state, bearer, request))]
pub async fn deliver_to_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
    bearer: BearerToken,
    Json(request): Json<DeliveryRequest>,
) -> Result<Json<DeliveryReport>, AppError> {
    let principal = state
        .credentials
        .authorize(bearer.as_str(), Role::MANAGER_OR_ABOVE)?;
    request.validate()?;

    let report = state
        .coordinator
        .deliver_to_room(&room, &request.frame_type, request.payload.clone(), request.exclusions())
        .await?;

    info!(
        subject_id = %principal.subject_id,
        room = %room,
        frame_type = %request.frame_type,
        delivered = report.delivered,
        "Delivered frame to room"
    );
    Ok(Json(report))
}

/// HTTP handler delivering a frame to every session
///
/// POST /realtime/broadcast (admin only)
#[instrument(name = "deliver_to_all", skip_all)]
pub async fn deliver_to_all(
    State(state): State<AppState>,
    bearer: BearerToken,
    Json(request): Json<DeliveryRequest>,
) -> Result<Json<DeliveryReport>, AppError> {
    let principal = state.credentials.authorize(bearer.as_str(), Role::ADMIN_ONLY)?;
    request.validate()?;

    let report = state
        .coordinator
        .deliver_to_all(&request.frame_type, request.payload.clone(), request.exclusions())
        .await?;

    info!(
        subject_id = %principal.subject_id,
        frame_type = %request.frame_type,
        delivered = report.delivered,
        "Broadcast frame to all sessions"
    );
    Ok(Json(report))
}

/// HTTP handler for domain events raised by the CRUD layer
///
/// POST /realtime/events (any authenticated role)
#[instrument(name = "publish_event", skip_all)]
pub async fn publish_event(
    State(state): State<AppState>,
    bearer: BearerToken,
    Json(request): Json<DeliveryRequest>,
) -> Result<Json<DeliveryReport>, AppError> {
    let principal = state.credentials.authorize(bearer.as_str(), Role::ANY)?;
    request.validate()?;

    let report = state
        .coordinator
        .publish_event(&request.frame_type, request.payload)
        .await??;

    info!(
        subject_id = %principal.subject_id,
        frame_type = %request.frame_type,
        delivered = report.delivered,
        "Published domain event"
    );
    Ok(Json(report))
}

/// GET /realtime/rooms/:room/members (manager or above)
#[instrument(name = "room_members", skip(state, bearer))]
pub async fn room_members(
    State(state): State<AppState>,
    Path(room): Path<String>,
    bearer: BearerToken,
) -> Result<Json<MembersResponse>, AppError> {
    state
        .credentials
        .authorize(bearer.as_str(), Role::MANAGER_OR_ABOVE)?;

    let members = state.coordinator.members_of(&room).await?;
    Ok(Json(MembersResponse { room, members }))
}
