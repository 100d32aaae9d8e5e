//! Authentication configuration.

use serde::{Deserialize, Serialize};

use crate::token::jwt::SigningAlgorithm;

/// Token signing configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// secret_key = "change-me-to-a-long-random-string"
/// algorithm = "HS256"
/// access_token_expire_minutes = 30
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens.
    pub secret_key: String,

    /// `HS256`, `HS384` or `HS512`.
    pub algorithm: String,

    /// Access token lifetime in minutes.
    pub access_token_expire_minutes: i64,

    /// Value of the `iss` claim.
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: 30,
            issuer: "carehub".to_string(),
        }
    }
}

/// Minimum secret length accepted for HMAC signing.
pub const MIN_SECRET_LEN: usize = 32;

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// An empty secret is allowed: the server then generates an ephemeral one.
    pub fn validate(&self) -> Result<(), String> {
        self.signing_algorithm()?;
        if !self.secret_key.is_empty() && self.secret_key.len() < MIN_SECRET_LEN {
            return Err(format!(
                "auth.secret_key must be at least {MIN_SECRET_LEN} characters"
            ));
        }
        if self.access_token_expire_minutes <= 0 {
            return Err("auth.access_token_expire_minutes must be greater than 0".into());
        }
        if self.issuer.trim().is_empty() {
            return Err("auth.issuer must not be empty".into());
        }
        Ok(())
    }

    pub fn signing_algorithm(&self) -> Result<SigningAlgorithm, String> {
        self.algorithm
            .parse()
            .map_err(|_| format!("auth.algorithm '{}' is not one of HS256, HS384, HS512", self.algorithm))
    }

    pub fn access_token_lifetime_secs(&self) -> i64 {
        self.access_token_expire_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.algorithm, "HS256");
        assert_eq!(config.access_token_expire_minutes, 30);
        assert_eq!(config.access_token_lifetime_secs(), 1800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let config = AuthConfig {
            algorithm: "RS256".into(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("auth.algorithm"));

        let config = AuthConfig {
            secret_key: "short".into(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("secret_key"));

        let config = AuthConfig {
            access_token_expire_minutes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
