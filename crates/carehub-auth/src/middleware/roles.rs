//! Role-gated extractors.
//!
//! Every admin and staff endpoint requires a verified token whose role claim
//! permits the action. Finer role sets are checked in handlers through
//! [`AuthContext::require_any`].

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use carehub_storage::UserRole;

use crate::error::AuthError;

use super::auth::{AuthState, BearerAuth};
use super::types::AuthContext;

/// Any authenticated non-patient account (admin, doctor, lab, pharmacist).
#[derive(Debug, Clone)]
pub struct StaffAuth(pub AuthContext);

impl<S> FromRequestParts<S> for StaffAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerAuth(auth) = BearerAuth::from_request_parts(parts, state).await?;
        if !auth.is_staff() {
            tracing::debug!(user_id = auth.user_id, "Staff access denied");
            return Err(AuthError::forbidden("Staff access required"));
        }
        Ok(Self(auth))
    }
}

/// Admin accounts only.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AuthContext);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerAuth(auth) = BearerAuth::from_request_parts(parts, state).await?;
        if auth.role != UserRole::Admin {
            tracing::debug!(
                user_id = auth.user_id,
                role = %auth.role,
                "Admin access denied: missing admin role"
            );
            return Err(AuthError::forbidden("Admin access required"));
        }
        tracing::debug!(user_id = auth.user_id, "Admin access granted");
        Ok(Self(auth))
    }
}
