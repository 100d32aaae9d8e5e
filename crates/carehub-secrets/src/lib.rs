//! Encryption at rest for personal health data.
//!
//! Extracted prescription text is sealed into a compact string token before
//! it is persisted:
//!
//! ```text
//! v1.<key_id>.<nonce base64>.<ciphertext base64>
//! ```
//!
//! The key id travels with the token so older rows stay readable after the
//! current key is rotated.

use std::collections::HashMap;
use std::sync::Arc;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use thiserror::Error;

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
pub const KEY_SIZE: usize = 32;

const TOKEN_VERSION: &str = "v1";

/// Raw AES-256 key.
pub type Key = [u8; KEY_SIZE];

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Key '{0}' not found in keyring")]
    UnknownKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),
}

pub type Result<T> = std::result::Result<T, SecretsError>;

/// Symmetric cipher for PII with a keyring for rotation.
///
/// New tokens are always sealed with the current key; `open` picks the key
/// named in the token.
#[derive(Clone)]
pub struct PiiCipher {
    current_key_id: String,
    keyring: Arc<HashMap<String, Key>>,
}

impl PiiCipher {
    /// Create a cipher with a single key.
    pub fn new(key: Key, key_id: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        validate_key_id(&key_id)?;
        let mut keyring = HashMap::new();
        keyring.insert(key_id.clone(), key);
        Ok(Self {
            current_key_id: key_id,
            keyring: Arc::new(keyring),
        })
    }

    /// Create a cipher from a configured key string (hex or base64).
    pub fn from_key_str(key_str: &str, key_id: impl Into<String>) -> Result<Self> {
        Self::new(parse_key(key_str)?, key_id)
    }

    /// Cipher with a freshly generated key. Data sealed with it is lost on restart.
    pub fn ephemeral() -> Self {
        let mut keyring = HashMap::new();
        keyring.insert("ephemeral".to_string(), generate_key());
        Self {
            current_key_id: "ephemeral".to_string(),
            keyring: Arc::new(keyring),
        }
    }

    /// Adds a retired key that can still open older tokens.
    pub fn with_retired_key(mut self, key: Key, key_id: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        validate_key_id(&key_id)?;
        if key_id == self.current_key_id {
            return Err(SecretsError::InvalidKey(format!(
                "retired key id '{key_id}' clashes with the current key"
            )));
        }
        Arc::make_mut(&mut self.keyring).insert(key_id, key);
        Ok(self)
    }

    pub fn current_key_id(&self) -> &str {
        &self.current_key_id
    }

    /// Encrypts `plaintext` with the current key.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let key = self
            .keyring
            .get(&self.current_key_id)
            .ok_or_else(|| SecretsError::UnknownKey(self.current_key_id.clone()))?;
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| SecretsError::Encryption(format!("Failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SecretsError::Encryption(e.to_string()))?;

        Ok(format!(
            "{TOKEN_VERSION}.{}.{}.{}",
            self.current_key_id,
            BASE64.encode(nonce_bytes),
            BASE64.encode(ciphertext)
        ))
    }

    /// Decrypts a token produced by [`seal`](Self::seal).
    pub fn open(&self, token: &str) -> Result<String> {
        let mut parts = token.split('.');
        let (Some(version), Some(key_id), Some(nonce_b64), Some(ct_b64), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(SecretsError::MalformedToken("expected 4 segments".into()));
        };

        if version != TOKEN_VERSION {
            return Err(SecretsError::MalformedToken(format!(
                "unsupported version '{version}'"
            )));
        }

        let key = self
            .keyring
            .get(key_id)
            .ok_or_else(|| SecretsError::UnknownKey(key_id.to_string()))?;

        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|e| SecretsError::MalformedToken(format!("Invalid nonce base64: {e}")))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(SecretsError::MalformedToken("Invalid nonce size".into()));
        }
        let ciphertext = BASE64
            .decode(ct_b64)
            .map_err(|e| SecretsError::MalformedToken(format!("Invalid ciphertext base64: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| SecretsError::Decryption(format!("Failed to create cipher: {e}")))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| SecretsError::Decryption(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| SecretsError::Decryption(format!("Invalid UTF-8 in decrypted value: {e}")))
    }
}

impl std::fmt::Debug for PiiCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiiCipher")
            .field("current_key_id", &self.current_key_id)
            .field("keyring", &"<redacted>")
            .finish()
    }
}

/// Parse a key from a 64-char hex or a base64 string.
pub fn parse_key(key_str: &str) -> Result<Key> {
    let key_str = key_str.trim();

    if key_str.len() == KEY_SIZE * 2 && key_str.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes =
            hex::decode(key_str).map_err(|e| SecretsError::InvalidKey(format!("Invalid hex key: {e}")))?;
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    let bytes = BASE64
        .decode(key_str)
        .map_err(|e| SecretsError::InvalidKey(format!("Invalid base64 key: {e}")))?;
    if bytes.len() != KEY_SIZE {
        return Err(SecretsError::InvalidKey(format!(
            "Key must be {} bytes, got {}",
            KEY_SIZE,
            bytes.len()
        )));
    }

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Generate a new random key
pub fn generate_key() -> Key {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn validate_key_id(key_id: &str) -> Result<()> {
    if key_id.is_empty() || key_id.contains('.') {
        return Err(SecretsError::InvalidKey(format!(
            "key id '{key_id}' must be non-empty and must not contain '.'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_recovers_plaintext() {
        let cipher = PiiCipher::new(generate_key(), "primary").unwrap();
        let token = cipher.seal("No text detected").unwrap();

        assert!(token.starts_with("v1.primary."));
        assert!(!token.contains("No text detected"));
        assert_eq!(cipher.open(&token).unwrap(), "No text detected");
    }

    #[test]
    fn nonces_are_random() {
        let cipher = PiiCipher::ephemeral();
        assert_ne!(cipher.seal("same").unwrap(), cipher.seal("same").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let a = PiiCipher::new(generate_key(), "k").unwrap();
        let b = PiiCipher::new(generate_key(), "k").unwrap();
        let token = a.seal("secret").unwrap();
        assert!(matches!(b.open(&token), Err(SecretsError::Decryption(_))));
    }

    #[test]
    fn retired_keys_still_open_old_tokens() {
        let old_key = generate_key();
        let old = PiiCipher::new(old_key, "2025").unwrap();
        let token = old.seal("Amoxicillin 500mg").unwrap();

        let rotated = PiiCipher::new(generate_key(), "2026")
            .unwrap()
            .with_retired_key(old_key, "2025")
            .unwrap();
        assert_eq!(rotated.open(&token).unwrap(), "Amoxicillin 500mg");
        assert!(rotated.seal("x").unwrap().starts_with("v1.2026."));
    }

    #[test]
    fn unknown_key_id_is_reported() {
        let cipher = PiiCipher::new(generate_key(), "a").unwrap();
        let other = PiiCipher::new(generate_key(), "b").unwrap();
        let token = other.seal("x").unwrap();
        assert!(matches!(cipher.open(&token), Err(SecretsError::UnknownKey(id)) if id == "b"));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let cipher = PiiCipher::ephemeral();
        for token in ["", "plain text", "v1.ephemeral.abc", "v2.ephemeral.AAAA.AAAA"] {
            assert!(
                matches!(cipher.open(token), Err(SecretsError::MalformedToken(_))),
                "{token}"
            );
        }
    }

    #[test]
    fn parse_key_accepts_hex_and_base64() {
        let key = generate_key();
        assert_eq!(parse_key(&hex::encode(key)).unwrap(), key);
        assert_eq!(parse_key(&BASE64.encode(key)).unwrap(), key);
        assert!(parse_key("too-short").is_err());
        assert!(parse_key(&BASE64.encode([0u8; 16])).is_err());
    }

    #[test]
    fn key_ids_with_dots_are_rejected() {
        assert!(PiiCipher::new(generate_key(), "a.b").is_err());
        assert!(PiiCipher::new(generate_key(), "").is_err());
    }
}
