// Library crate for the attendance realtime coordinator
// This file exposes the public API for integration tests

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod event;
pub mod room;
pub mod routes;
pub mod session;
pub mod shared;
pub mod store;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use auth::{Claims, CredentialService, Role};
pub use config::AppConfig;
pub use coordinator::{Coordinator, CoordinatorHandle};
pub use routes::build_router;
pub use session::SessionId;
pub use shared::{AppError, AppState};
pub use store::{InMemoryKeyValueStore, UserDirectory};
pub use websockets::Frame;
