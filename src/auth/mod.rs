// Public API - what other modules can use
pub use errors::AuthError;
pub use handlers::{login, refresh, LoginRequest, TokenResponse};
pub use middleware::BearerToken;
pub use token::CredentialService;
pub use types::{Claims, Role, TokenHeader};

// Internal modules
mod errors;
mod handlers;
mod middleware;
mod token;
mod types;
