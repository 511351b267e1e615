use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{AuthError, CredentialService};
use crate::coordinator::{CoordinatorError, CoordinatorHandle};
use crate::event::RouteError;
use crate::store::UserDirectory;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialService,
    pub coordinator: CoordinatorHandle,
    pub users: UserDirectory,
}

impl AppState {
    pub fn new(credentials: CredentialService, coordinator: CoordinatorHandle, users: UserDirectory) -> Self {
        Self {
            credentials,
            coordinator,
            users,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppError::Auth(AuthError::Signing(_) | AuthError::LifetimeOutOfRange(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Auth(_) | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Route(RouteError::UnknownRoom(_)) => StatusCode::NOT_FOUND,
            AppError::Route(RouteError::MalformedMessage(_)) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Coordinator(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::auth::Role;
    use crate::store::InMemoryKeyValueStore;
    use std::sync::Arc;

    pub const TEST_SECRET: &str = "test-secret";

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        credentials: Option<CredentialService>,
        users: Vec<(String, Role, String)>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                credentials: None,
                users: Vec::new(),
            }
        }

        pub fn with_credentials(mut self, credentials: CredentialService) -> Self {
            self.credentials = Some(credentials);
            self
        }

        pub fn with_user(mut self, user_id: &str, role: Role, password: &str) -> Self {
            self.users
                .push((user_id.to_string(), role, password.to_string()));
            self
        }

        /// Spawns a fresh coordinator; must run inside a tokio runtime
        pub async fn build(self) -> AppState {
            let users = UserDirectory::new(Arc::new(InMemoryKeyValueStore::new()));
            for (user_id, role, password) in &self.users {
                users.register(user_id, *role, password).await.unwrap();
            }

            let (coordinator, _worker) = CoordinatorHandle::spawn(64);
            AppState {
                credentials: self
                    .credentials
                    .unwrap_or_else(|| CredentialService::new(TEST_SECRET, 3600)),
                coordinator,
                users,
            }
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
