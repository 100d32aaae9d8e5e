//! Access token issuance and validation.

pub mod jwt;

pub use jwt::{AccessTokenClaims, JwtError, JwtService, SigningAlgorithm};
