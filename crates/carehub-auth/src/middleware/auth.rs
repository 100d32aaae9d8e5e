//! Bearer token authentication extractor.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use carehub_auth::middleware::BearerAuth;
//!
//! async fn me(BearerAuth(auth): BearerAuth) -> String {
//!     format!("Hello, {}!", auth.email)
//! }
//!
//! let app = Router::new().route("/me", get(me)).with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::token::jwt::{JwtError, JwtService};

use super::types::AuthContext;

// =============================================================================
// Auth State
// =============================================================================

/// State required by the auth extractors.
///
/// Include it in the application state and expose it through `FromRef`.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(jwt_service: Arc<JwtService>) -> Self {
        Self { jwt_service }
    }

    /// Validates a raw token and builds the request context.
    pub fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.jwt_service.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode token");
            match e {
                JwtError::Expired => AuthError::TokenExpired,
                other => AuthError::invalid_token(other.to_string()),
            }
        })?;
        Ok(AuthContext::from_claims(claims))
    }
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// Axum extractor that requires a valid `Authorization: Bearer <token>` header.
pub struct BearerAuth(pub AuthContext);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let token = bearer_token(parts)?;
        let context = auth_state.authenticate(token)?;
        tracing::debug!(user_id = context.user_id, role = %context.role, "Request authenticated");
        Ok(Self(context))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AuthError::unauthorized("Not authenticated"))?
        .to_str()
        .map_err(|_| AuthError::unauthorized("Malformed Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::unauthorized("Authorization scheme must be Bearer"))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::unauthorized("Empty Bearer token"));
    }
    Ok(token)
}
