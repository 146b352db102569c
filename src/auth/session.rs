//! Session token validation
//!
//! Sessions are issued by the identity provider as HS256 JWTs signed with a
//! shared secret. This service only verifies them; `issue` exists for tests
//! and local tooling.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserRole;

/// Session verification errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Session expired")]
    Expired,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

/// Claims carried by a session token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// ADMIN, USER or GUEST
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// A verified session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// Verifies session tokens against the identity provider's secret
pub struct SessionVerifier {
    secret: String,
    cookie_name: String,
}

impl SessionVerifier {
    pub fn new(secret: impl Into<String>, cookie_name: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: cookie_name.into(),
        }
    }

    /// Name of the cookie the session may arrive in
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::InvalidToken(e.to_string()),
        })?;

        let claims = token_data.claims;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| SessionError::InvalidToken(format!("invalid subject: {}", e)))?;
        let role = UserRole::parse(&claims.role)
            .ok_or_else(|| SessionError::InvalidToken(format!("unknown role '{}'", claims.role)))?;

        Ok(Session { user_id, role })
    }

    /// Mint a session token
    pub fn issue(&self, user_id: Uuid, role: UserRole, ttl: Duration) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| SessionError::EncodingFailed(e.to_string()))
    }
}
