use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::repository::KeyValueStore;
use crate::auth::Role;
use crate::shared::AppError;

const USER_PREFIX: &str = "users:";

/// Account record kept under `users:<id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub role: Role,
    pub password_hash: String,
}

/// Accounts that may log in and receive credentials
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn KeyValueStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, user_id: &str, role: Role, password: &str) -> Result<UserRecord, AppError> {
        if user_id.is_empty() {
            return Err(AppError::BadRequest("userId must not be empty".to_string()));
        }

        let record = UserRecord {
            user_id: user_id.to_string(),
            role,
            password_hash: hash_password(password)?,
        };
        let value = serde_json::to_value(&record).map_err(|e| AppError::Storage(e.to_string()))?;
        self.store.put(&user_key(user_id), value).await?;

        info!(user_id = %user_id, role = %role, "User registered");
        Ok(record)
    }

    /// Returns the record when the password matches
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, user_id: &str, password: &str) -> Result<UserRecord, AppError> {
        let record = self.find(user_id).await?.ok_or_else(|| {
            warn!(user_id = %user_id, "Login for unknown user");
            AppError::Unauthorized("Invalid credentials".to_string())
        })?;

        if !verify_password(password, &record.password_hash)? {
            warn!(user_id = %user_id, "Login with wrong password");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        Ok(record)
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        match self.store.get(&user_key(user_id)).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AppError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, user_id: &str) -> Result<bool, AppError> {
        self.store.delete(&user_key(user_id)).await
    }

    pub async fn list(&self) -> Result<Vec<UserRecord>, AppError> {
        self.store
            .list_by_prefix(USER_PREFIX)
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(|e| AppError::Storage(e.to_string())))
            .collect()
    }
}

fn user_key(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Argon2id PHC string with a random salt
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "Password hashing failed");
            AppError::Storage("Failed to process password".to_string())
        })
}

/// False on a wrong password; an unreadable stored hash is a storage error
fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "Stored password hash is not a PHC string");
        AppError::Storage("Invalid password hash format".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
