use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Roles carried by credentials, ordered admin ⊇ manager ⊇ employee
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub const ADMIN_ONLY: &'static [Role] = &[Role::Admin];
    pub const MANAGER_OR_ABOVE: &'static [Role] = &[Role::Admin, Role::Manager];
    pub const ANY: &'static [Role] = &[Role::Admin, Role::Manager, Role::Employee];

    /// Privilege level, higher is more privileged
    pub fn level(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Manager => 2,
            Role::Employee => 1,
        }
    }

    /// Every role whose privileges include those of `min`
    pub fn at_least(min: Role) -> Vec<Role> {
        Role::iter().filter(|role| role.level() >= min.level()).collect()
    }
}

/// Fixed header of the single HS256 profile we issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    pub const ALGORITHM: &'static str = "HS256";

    pub fn hs256() -> Self {
        Self {
            alg: Self::ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Credential payload; also the principal handed back by verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub subject_id: String,
    pub role: Role,
    pub iat: i64, // Issued at (unix seconds)
    pub exp: i64, // Expiry (unix seconds)
    pub jti: String,
}

impl Claims {
    /// `exp - iat`, or None when the difference does not fit
    pub fn lifetime_seconds(&self) -> Option<i64> {
        self.exp.checked_sub(self.iat)
    }
}
