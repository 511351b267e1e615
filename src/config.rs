use std::str::FromStr;
use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEV_SECRET: &str = "dev-only-insecure-secret-change-me";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 86_400;
const DEFAULT_COORDINATOR_MAILBOX: usize = 1024;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Shared HMAC secret for credentials.
    pub jwt_secret: String,
    /// Lifetime of credentials issued at login.
    pub token_ttl_seconds: i64,
    /// Capacity of the coordinator mailbox.
    pub coordinator_mailbox: usize,
    /// Admin account seeded into the user directory at start-up.
    pub bootstrap_admin: Option<(String, String)>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Every variable has a default; a missing `JWT_SECRET` falls back to a
    /// development placeholder.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!("JWT_SECRET not set, using the insecure development secret");
                DEV_SECRET.to_string()
            });

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_ID").filter(|s| !s.is_empty()),
            lookup("BOOTSTRAP_ADMIN_PASSWORD").filter(|s| !s.is_empty()),
        ) {
            (Some(id), Some(password)) => Some((id, password)),
            _ => None,
        };

        Self {
            bind_addr: lookup("BIND_ADDR")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            token_ttl_seconds: positive_or(&lookup, "TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS),
            coordinator_mailbox: positive_or(&lookup, "COORDINATOR_MAILBOX", DEFAULT_COORDINATOR_MAILBOX),
            bootstrap_admin,
        }
    }
}

// Unparseable, zero and negative values fall back to the default
fn positive_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Copy + Default + PartialOrd,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(var = name, value = %raw, "Expected a positive number, using default");
            default
        }
    }
}
