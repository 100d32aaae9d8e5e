use carehub_auth::config::AuthConfig;
use carehub_db_postgres::PostgresConfig;
use carehub_storage::UserRole;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Access token signing
    #[serde(default)]
    pub auth: AuthConfig,
    /// PII encryption keys
    #[serde(default)]
    pub crypto: CryptoConfig,
    /// Chat-completion provider used by the triage assistant
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    /// Video meeting provider for online consultations
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub pharmacy: PharmacyConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Accounts created on startup when missing
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            if self.storage.postgres.url.trim().is_empty() {
                return Err("storage.postgres.url must not be empty".into());
            }
            if self.storage.postgres.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        if !self.crypto.encryption_key.is_empty() {
            carehub_secrets::parse_key(&self.crypto.encryption_key)
                .map_err(|e| format!("crypto.encryption_key: {e}"))?;
        }
        for retired in &self.crypto.retired_keys {
            if retired.key_id == self.crypto.key_id {
                return Err(format!(
                    "crypto.retired_keys reuses the current key id '{}'",
                    retired.key_id
                ));
            }
            carehub_secrets::parse_key(&retired.key)
                .map_err(|e| format!("crypto.retired_keys[{}]: {e}", retired.key_id))?;
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err("ai.temperature must be between 0.0 and 2.0".into());
        }
        if self.ai.timeout_ms == 0 || self.video.timeout_ms == 0 {
            return Err("provider timeouts must be > 0".into());
        }
        if self.ocr.enabled && self.ocr.command.trim().is_empty() {
            return Err("ocr.enabled=true requires ocr.command".into());
        }
        if self.realtime.buffer == 0 {
            return Err("realtime.buffer must be > 0".into());
        }
        for staff in &self.bootstrap.staff {
            if staff.role == UserRole::Patient {
                return Err(format!(
                    "bootstrap.staff '{}' must have a staff role",
                    staff.email
                ));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size; bounds prescription uploads.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Directory where uploaded prescription images are kept. Not kept when unset.
    #[serde(default)]
    pub upload_dir: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            upload_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Used when `backend = "postgres"`
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// 32-byte key, hex or base64. An ephemeral key is generated when empty.
    #[serde(default)]
    pub encryption_key: String,
    #[serde(default = "default_key_id")]
    pub key_id: String,
    /// Older keys still accepted for decryption.
    #[serde(default)]
    pub retired_keys: Vec<RetiredKey>,
}

fn default_key_id() -> String {
    "primary".into()
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            encryption_key: String::new(),
            key_id: default_key_id(),
            retired_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetiredKey {
    pub key_id: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// The assistant answers "offline" when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_ai_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_ai_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_ai_temperature() -> f32 {
    0.3
}
fn default_provider_timeout_ms() -> u64 {
    30_000
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            temperature: default_ai_temperature(),
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Executable that reads an image on stdin and writes text on stdout.
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_args")]
    pub args: Vec<String>,
    /// Returned when the engine is missing or fails.
    #[serde(default = "default_ocr_fallback")]
    pub fallback_text: String,
}

fn default_true() -> bool {
    true
}
fn default_ocr_command() -> String {
    "tesseract".into()
}
fn default_ocr_args() -> Vec<String> {
    vec!["stdin".into(), "stdout".into()]
}
fn default_ocr_fallback() -> String {
    "Simulated: Amoxicillin 500mg, Paracetamol (OCR Missing)".into()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_ocr_command(),
            args: default_ocr_args(),
            fallback_text: default_ocr_fallback(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Server-to-server OAuth credentials. Placeholder links are generated when any is unset.
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_video_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_video_oauth_url")]
    pub oauth_url: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_video_api_base() -> String {
    "https://api.zoom.us".into()
}
fn default_video_oauth_url() -> String {
    "https://zoom.us/oauth/token".into()
}

impl VideoConfig {
    pub fn is_configured(&self) -> bool {
        [&self.account_id, &self.client_id, &self.client_secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            client_id: None,
            client_secret: None,
            api_base_url: default_video_api_base(),
            oauth_url: default_video_oauth_url(),
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PharmacyConfig {
    /// Flat JSON array of catalog entries, loaded once at startup.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
}

fn default_catalog_path() -> String {
    "mock_medicine.json".into()
}

impl Default for PharmacyConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Frames queued per connection before new ones are dropped.
    #[serde(default = "default_realtime_buffer")]
    pub buffer: usize,
}

fn default_realtime_buffer() -> usize {
    carehub_core::events::DEFAULT_CONNECTION_BUFFER
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            buffer: default_realtime_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    /// If set, creates an admin user on startup (if not already present)
    #[serde(default)]
    pub admin_user: Option<AdminUserConfig>,
    /// Additional staff accounts (doctors, lab, pharmacists)
    #[serde(default)]
    pub staff: Vec<StaffAccountConfig>,
}

/// Configuration for bootstrapping an admin user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserConfig {
    #[serde(default = "default_admin_name")]
    pub full_name: String,
    pub email: String,
    /// Plain text, hashed on startup.
    /// Prefer CAREHUB__BOOTSTRAP__ADMIN_USER__PASSWORD.
    pub password: String,
}

fn default_admin_name() -> String {
    "Administrator".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAccountConfig {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    #[serde(default)]
    pub department: Option<String>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file name.
    pub const DEFAULT_CONFIG_FILE: &str = "carehub.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", pathbuf.display()));
        }
        // Environment variable overrides, e.g., CAREHUB__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("CAREHUB")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.realtime.buffer, 64);
        assert_eq!(cfg.ai.model, "llama-3.3-70b-versatile");
        assert!(!cfg.video.is_configured());
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));

        let mut cfg = AppConfig::default();
        cfg.crypto.encryption_key = "not-a-key".into();
        assert!(cfg.validate().unwrap_err().contains("crypto.encryption_key"));

        let mut cfg = AppConfig::default();
        cfg.bootstrap.staff.push(StaffAccountConfig {
            full_name: "P".into(),
            email: "p@example.com".into(),
            password: "pw".into(),
            role: UserRole::Patient,
            department: None,
        });
        assert!(cfg.validate().unwrap_err().contains("staff role"));
    }

    #[test]
    fn video_requires_all_credentials() {
        let cfg = VideoConfig {
            account_id: Some("acc".into()),
            client_id: Some("id".into()),
            client_secret: Some(String::new()),
            ..Default::default()
        };
        assert!(!cfg.is_configured());
    }
}
