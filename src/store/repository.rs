use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, instrument};

use crate::shared::AppError;

/// Key-value persistence consumed by the CRUD layer and the user directory
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;
    async fn put(&self, key: &str, value: Value) -> Result<(), AppError>;
    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
    /// Entries whose key starts with `prefix`, in key order
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, AppError>;
}

/// In-memory implementation of KeyValueStore for development and testing
///
/// Data lives only as long as the process.
pub struct InMemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Storage("key-value store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let entries = self.lock()?;
        Ok(entries.get(key).cloned())
    }

    #[instrument(skip(self, value))]
    async fn put(&self, key: &str, value: Value) -> Result<(), AppError> {
        debug!(key = %key, "Storing entry in memory");
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    #[instrument(skip(self))]
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, AppError> {
        let entries = self.lock()?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
