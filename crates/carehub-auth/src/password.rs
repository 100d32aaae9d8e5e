//! Password hashing and verification.
//!
//! Hashes are Argon2id PHC strings with a random salt (OsRng) and default
//! parameters.
//!
//! # Example
//!
//! ```
//! use carehub_auth::password::{hash_password, verify_password};
//!
//! let hash = hash_password("s3cret").unwrap();
//! assert!(hash.starts_with("$argon2id$"));
//! assert!(verify_password("s3cret", &hash));
//! assert!(!verify_password("wrong", &hash));
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AuthError;

/// Stored for accounts that must never log in (walk-in patients, dependents).
/// Not a valid PHC string, so verification always fails.
pub const UNUSABLE_PASSWORD: &str = "!";

/// Hash a password for storage.
///
/// # Errors
///
/// Returns `AuthError::Internal` if hashing fails (rare).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("Password hashing failed: {e}")))
}

/// Verify a password against a stored hash.
///
/// A malformed stored hash verifies as `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::debug!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_async(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::internal(format!("Password hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool. A failed task verifies as `false`.
pub async fn verify_password_async(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Password verification task failed");
            false
        })
}
