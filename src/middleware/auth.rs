//! Authentication extractor
//!
//! Resolves the caller's session from `Authorization: Bearer <token>` or,
//! failing that, from the session cookie.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{SessionError, SessionVerifier};
use crate::error::ApiError;
use crate::models::UserRole;

/// Authenticated user extracted from the session token
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl AuthenticatedUser {
    /// Guests may browse but not trade
    pub fn ensure_can_trade(&self) -> Result<(), ApiError> {
        if self.role == UserRole::Guest {
            return Err(ApiError::Forbidden(
                "Guest accounts cannot perform this action".to_string(),
            ));
        }
        Ok(())
    }
}

/// Extractor for authenticated users
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<SessionVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<SessionVerifier>::from_ref(state);

        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string());

        let token = match bearer {
            Some(token) => token,
            None => {
                let jar = CookieJar::from_headers(&parts.headers);
                jar.get(verifier.cookie_name())
                    .map(|cookie| cookie.value().to_string())
                    .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?
            }
        };

        let session = verifier.verify(&token).map_err(|e| match e {
            SessionError::Expired => ApiError::Unauthorized("Session has expired".to_string()),
            _ => ApiError::Unauthorized("Invalid session".to_string()),
        })?;

        Ok(AuthenticatedUser {
            user_id: session.user_id,
            role: session.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_cannot_trade() {
        let guest = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: UserRole::Guest,
        };
        assert!(matches!(guest.ensure_can_trade(), Err(ApiError::Forbidden(_))));

        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: UserRole::User,
        };
        assert!(user.ensure_can_trade().is_ok());
    }
}
