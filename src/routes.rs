use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::coordinator;
use crate::shared::AppState;
use crate::websockets::websocket_handler;

/// Every HTTP and WebSocket route of the service
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(coordinator::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/ws", get(websocket_handler))
        .route("/realtime/rooms/:room/events", post(coordinator::deliver_to_room))
        .route("/realtime/rooms/:room/members", get(coordinator::room_members))
        .route("/realtime/broadcast", post(coordinator::deliver_to_all))
        .route("/realtime/events", post(coordinator::publish_event))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
