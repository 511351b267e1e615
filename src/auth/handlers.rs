use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{middleware::BearerToken, types::Role};
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub user_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// HTTP handler for logging in
///
/// POST /auth/login
/// Returns a signed credential for the account
#[instrument(name = "login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .users
        .authenticate(&request.user_id, &request.password)
        .await?;

    let (token, claims) = state.credentials.issue_with_claims(
        &user.user_id,
        user.role,
        state.credentials.default_ttl_seconds,
    )?;

    info!(user_id = %user.user_id, role = %user.role, "Login successful");

    Ok(Json(token_response(token, claims.subject_id, claims.role, claims.exp)))
}

/// HTTP handler for refreshing a credential
///
/// POST /auth/refresh with the current token as Bearer
#[instrument(name = "refresh", skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<Json<TokenResponse>, AppError> {
    let (token, claims) = state.credentials.refresh_with_claims(bearer.as_str())?;

    info!(subject_id = %claims.subject_id, "Credential refreshed");

    Ok(Json(token_response(token, claims.subject_id, claims.role, claims.exp)))
}

fn token_response(token: String, user_id: String, role: Role, exp: i64) -> TokenResponse {
    TokenResponse {
        token,
        user_id,
        role,
        expires_at: DateTime::from_timestamp(exp, 0).unwrap_or_else(Utc::now),
    }
}
