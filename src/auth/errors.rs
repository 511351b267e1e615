use thiserror::Error;

use super::types::Role;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    Expired,

    #[error("Bad token signature")]
    BadSignature,

    #[error("Forbidden: role {presented} is not one of [{}]", join_roles(.required))]
    Forbidden { required: Vec<Role>, presented: Role },

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Credential lifetime out of range: {0}")]
    LifetimeOutOfRange(i64),
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|role| role.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
