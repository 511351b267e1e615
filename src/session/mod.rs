// Public API - what other modules can use
pub use models::{Session, SessionId};
pub use registry::{Outbound, SessionRegistry};

// Internal modules
mod models;
mod registry;
