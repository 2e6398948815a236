//! JWT validation.
//!
//! # Responsibilities
//! - Extract the bearer token from the Authorization header
//! - Verify signature, expiry, and (when configured) issuer/audience
//! - Surface the validated identity for downstream claim headers
//!
//! # Design Decisions
//! - HS256 only; the signing secret is shared with the token issuer
//! - Validation failures collapse to one opaque rejection for callers

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::config::JwtConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header missing or malformed")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,
}

/// Claims carried by gateway tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub exp: u64,
    pub iat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// A caller whose token checked out.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

pub struct TokenValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    audience: Option<String>,
    expires_in_secs: u64,
}

impl TokenValidator {
    pub fn new(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = cfg.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = cfg.audience.as_deref() {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }

        Self {
            encoding: EncodingKey::from_secret(cfg.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret_key.as_bytes()),
            validation,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            expires_in_secs: cfg.expires_in_secs,
        }
    }

    /// Validate a bearer token and return the caller's identity.
    pub fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token validation failed");
            AuthError::InvalidToken
        })?;
        Ok(data.claims.into())
    }

    /// Mint a token for the given identity. Used by the CLI and tests;
    /// production tokens normally come from the identity provider.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let claims = Claims {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            exp: now + self.expires_in_secs,
            iat: now,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "token generation failed");
            AuthError::InvalidToken
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(header: &str) -> Result<&str, AuthError> {
    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}
