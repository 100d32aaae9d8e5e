//! Axum extractors for authentication and role gating.
//!
//! - [`BearerAuth`]: any valid access token
//! - [`StaffAuth`]: non-patient roles
//! - [`AdminAuth`]: admins only
//!
//! Rejections are `AuthError`, rendered as `{"detail": ...}` JSON.

pub mod auth;
pub mod error;
pub mod roles;
pub mod types;

pub use auth::{AuthState, BearerAuth};
pub use roles::{AdminAuth, StaffAuth};
pub use types::AuthContext;
