//! # carehub-auth
//!
//! Authentication and authorization for the CareHub server:
//!
//! - [`password`] - Argon2id password hashing
//! - [`token`] - JWT access tokens
//! - [`middleware`] - axum extractors (bearer auth, staff and admin gates)
//! - [`config`] - token signing configuration

pub mod config;
pub mod error;
pub mod middleware;
pub mod password;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, ErrorCategory};
pub use middleware::{AdminAuth, AuthContext, AuthState, BearerAuth, StaffAuth};
pub use password::{
    UNUSABLE_PASSWORD, hash_password, hash_password_async, verify_password, verify_password_async,
};
pub use token::{AccessTokenClaims, JwtError, JwtService, SigningAlgorithm};
