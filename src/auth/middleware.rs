use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::shared::AppError;

/// Raw credential from an `Authorization: Bearer` header.
///
/// Extraction only checks the header shape; handlers decide which roles may
/// proceed by passing it to `CredentialService::authorize`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| {
                warn!(uri = %parts.uri, "Missing Authorization header in request");
                AppError::Unauthorized("Missing authorization header".to_string())
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!(uri = %parts.uri, "Invalid Authorization header format (expected Bearer token)");
                AppError::Unauthorized("Invalid authorization header format".to_string())
            })?;

        Ok(BearerToken(token.to_string()))
    }
}
