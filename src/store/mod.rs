// Public API - persistence collaborator and the account directory built on it
pub use repository::{InMemoryKeyValueStore, KeyValueStore};
pub use users::{UserDirectory, UserRecord};

// Internal modules
mod repository;
mod users;
