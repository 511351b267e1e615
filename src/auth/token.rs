use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::Utc;
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::errors::AuthError;
use super::types::{Claims, Role, TokenHeader};

/// Issues and checks HS256 credentials signed with one shared secret.
///
/// Only the HMAC primitive comes from `jsonwebtoken`; segment layout and the
/// verification order (shape, payload, expiry, signature) are fixed here so the
/// signing backend can be swapped without touching callers.
#[derive(Clone)]
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    pub default_ttl_seconds: i64,
}

impl CredentialService {
    pub fn new(secret: &str, default_ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl_seconds,
        }
    }

    /// Creates a signed token for the subject valid for `ttl_seconds` from now
    #[instrument(skip(self))]
    pub fn issue(&self, subject_id: &str, role: Role, ttl_seconds: i64) -> Result<String, AuthError> {
        self.issue_at(subject_id, role, ttl_seconds, Utc::now().timestamp())
    }

    /// Same as [`issue`](Self::issue) against an explicit clock (unix seconds)
    pub fn issue_at(
        &self,
        subject_id: &str,
        role: Role,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<String, AuthError> {
        self.issue_with_claims_at(subject_id, role, ttl_seconds, now)
            .map(|(token, _)| token)
    }

    /// Issues a token and also returns the claims it carries
    pub fn issue_with_claims(
        &self,
        subject_id: &str,
        role: Role,
        ttl_seconds: i64,
    ) -> Result<(String, Claims), AuthError> {
        self.issue_with_claims_at(subject_id, role, ttl_seconds, Utc::now().timestamp())
    }

    pub fn issue_with_claims_at(
        &self,
        subject_id: &str,
        role: Role,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<(String, Claims), AuthError> {
        let exp = now
            .checked_add(ttl_seconds)
            .ok_or(AuthError::LifetimeOutOfRange(ttl_seconds))?;
        let claims = Claims {
            subject_id: subject_id.to_string(),
            role,
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let header = encode_segment(&TokenHeader::hs256())?;
        let payload = encode_segment(&claims)?;
        let signing_input = format!("{header}.{payload}");

        let signature = crypto::sign(signing_input.as_bytes(), &self.encoding_key, Algorithm::HS256)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        debug!(
            subject_id = %claims.subject_id,
            role = %claims.role,
            exp = claims.exp,
            "Issued credential"
        );

        Ok((format!("{signing_input}.{signature}"), claims))
    }

    /// Checks shape, expiry and signature, returning the claims if all pass
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) against an explicit clock (unix seconds)
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let mut segments = token.split('.');
        let (header, payload, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
                    (h, p, s)
                }
                _ => {
                    debug!("Token does not have three non-empty segments");
                    return Err(AuthError::MalformedToken);
                }
            };

        let decoded_header: TokenHeader = decode_segment(header)?;
        if decoded_header.alg != TokenHeader::ALGORITHM {
            debug!(alg = %decoded_header.alg, "Unsupported token algorithm");
            return Err(AuthError::MalformedToken);
        }

        let claims: Claims = decode_segment(payload)?;
        if claims.exp < now {
            debug!(exp = claims.exp, now, "Token expired");
            return Err(AuthError::Expired);
        }

        let signing_input = &token[..header.len() + 1 + payload.len()];
        let valid = crypto::verify(
            signature,
            signing_input.as_bytes(),
            &self.decoding_key,
            Algorithm::HS256,
        )
        .unwrap_or(false);

        if !valid {
            debug!(subject_id = %claims.subject_id, "Token signature mismatch");
            return Err(AuthError::BadSignature);
        }

        Ok(claims)
    }

    /// Re-issues a valid token with fresh iat/exp/jti and the same lifetime.
    /// The presented token stays valid until its own expiry.
    #[instrument(skip(self, token))]
    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        self.refresh_at(token, Utc::now().timestamp())
    }

    pub fn refresh_at(&self, token: &str, now: i64) -> Result<String, AuthError> {
        self.refresh_with_claims_at(token, now).map(|(token, _)| token)
    }

    /// Refreshes a token and also returns the claims of the new one
    pub fn refresh_with_claims(&self, token: &str) -> Result<(String, Claims), AuthError> {
        self.refresh_with_claims_at(token, Utc::now().timestamp())
    }

    pub fn refresh_with_claims_at(&self, token: &str, now: i64) -> Result<(String, Claims), AuthError> {
        let claims = self.verify_at(token, now)?;
        let lifetime = claims
            .lifetime_seconds()
            .ok_or(AuthError::LifetimeOutOfRange(claims.exp))?;
        self.issue_with_claims_at(&claims.subject_id, claims.role, lifetime, now)
    }

    /// Verifies the token and requires its role to be one of `allowed`
    #[instrument(skip(self, token))]
    pub fn authorize(&self, token: &str, allowed: &[Role]) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        ensure_role(&claims, allowed)?;
        Ok(claims)
    }

    pub fn authorize_at(&self, token: &str, allowed: &[Role], now: i64) -> Result<Claims, AuthError> {
        let claims = self.verify_at(token, now)?;
        ensure_role(&claims, allowed)?;
        Ok(claims)
    }
}

fn ensure_role(claims: &Claims, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&claims.role) {
        return Ok(());
    }

    debug!(
        subject_id = %claims.subject_id,
        role = %claims.role,
        "Role not permitted for action"
    );
    Err(AuthError::Forbidden {
        required: allowed.to_vec(),
        presented: claims.role,
    })
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::Signing(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

// Accepts base64url (what we issue) and padded standard base64.
fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD.decode(segment))
        .map_err(|_| AuthError::MalformedToken)?;

    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}
