//! Caller authentication.
//!
//! The buyer's uid is only ever taken from a verified ID token, never from
//! the request body.

mod firebase;

pub use firebase::FirebaseTokenVerifier;

use async_trait::async_trait;
use thiserror::Error;

/// A verified caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub uid: String,
    pub email: Option<String>,
    /// Remaining token claims.
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl Caller {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
            claims: serde_json::Map::new(),
        }
    }
}

/// Errors that can occur while authenticating a caller.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No bearer token was presented
    #[error("missing bearer token")]
    Missing,

    /// The token is malformed, expired, revoked or not ours
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The identity provider could not be reached
    #[error("identity provider error: {0}")]
    Upstream(String),
}

/// Verifies bearer ID tokens.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Caller, IdentityError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authenticate the raw `Authorization` header value.
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    authorization: Option<&str>,
) -> Result<Caller, IdentityError> {
    let token = bearer_token(authorization).ok_or(IdentityError::Missing)?;
    verifier.verify_token(token).await
}
