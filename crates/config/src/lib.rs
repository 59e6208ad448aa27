//! Configuration loading, validation, and management for VoltDesk.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! Validates all settings at startup. There is no global settings singleton;
//! the loaded [`AppConfig`] is passed explicitly into each component.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `voltdesk.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application display name (used in notification bodies)
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Persistence configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Token and credential configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Anomaly model configuration
    #[serde(default)]
    pub scorer: ScorerConfig,

    /// SMTP delivery for reset tokens (optional)
    #[serde(default)]
    pub email: EmailConfig,

    /// SMS delivery for reset tokens (optional)
    #[serde(default)]
    pub sms: SmsConfig,
}

fn default_app_name() -> String {
    "VoltDesk".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_name", &self.app_name)
            .field("database", &self.database)
            .field("gateway", &self.gateway)
            .field("auth", &self.auth)
            .field("scorer", &self.scorer)
            .field("email", &self.email)
            .field("sms", &self.sms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, or `":memory:"` for an ephemeral database
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "voltdesk.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Sliding-window rate limit, requests per minute per client
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}
fn default_rate_limit() -> u32 {
    60
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            rate_limit_per_minute: default_rate_limit(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Token and credential configuration.
///
/// Key rotation: both key lists are ordered. The first key signs new tokens;
/// every key is tried in order during verification, so an old key can stay
/// in the list until all tokens signed with it have expired.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Access-token signing/verification keys, primary first
    #[serde(default = "default_access_keys")]
    pub access_keys: Vec<String>,

    /// Refresh-token keys, disjoint from the access keys
    #[serde(default = "default_refresh_keys")]
    pub refresh_keys: Vec<String>,

    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,

    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,

    /// Password-reset token lifetime
    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_ttl_minutes: i64,
}

fn default_access_keys() -> Vec<String> {
    vec!["insecure-dev-access-key".into()]
}
fn default_refresh_keys() -> Vec<String> {
    vec!["insecure-dev-refresh-key".into()]
}
fn default_access_ttl_minutes() -> i64 {
    30
}
fn default_refresh_ttl_days() -> i64 {
    7
}
fn default_reset_ttl_minutes() -> i64 {
    60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_keys: default_access_keys(),
            refresh_keys: default_refresh_keys(),
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_days: default_refresh_ttl_days(),
            reset_ttl_minutes: default_reset_ttl_minutes(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_keys", &format!("[{} key(s)]", self.access_keys.len()))
            .field(
                "refresh_keys",
                &format!("[{} key(s)]", self.refresh_keys.len()),
            )
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .field("reset_ttl_minutes", &self.reset_ttl_minutes)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Path to the serialized anomaly model. A missing file is not an error;
    /// the telemetry endpoint then returns null score/label.
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

fn default_model_path() -> String {
    "models/anomaly.json".into()
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_pass: Option<String>,

    /// From address; falls back to smtp_user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_pass: None,
            from_address: None,
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &redact(&self.smtp_pass))
            .field("from_address", &self.from_address)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_number: Option<String>,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redact(&self.auth_token))
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (`voltdesk.toml` in the
    /// working directory), then apply environment variable overrides:
    ///
    /// - `VOLTDESK_DATABASE_URL`
    /// - `VOLTDESK_ACCESS_KEY` / `VOLTDESK_REFRESH_KEY` (become the primary
    ///   signing keys; file-configured keys stay valid for verification)
    /// - `VOLTDESK_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("voltdesk.toml"))?;

        if let Ok(url) = std::env::var("VOLTDESK_DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(key) = std::env::var("VOLTDESK_ACCESS_KEY") {
            config.auth.access_keys.insert(0, key);
        }
        if let Ok(key) = std::env::var("VOLTDESK_REFRESH_KEY") {
            config.auth.refresh_keys.insert(0, key);
        }
        if let Ok(port) = std::env::var("VOLTDESK_PORT") {
            config.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("VOLTDESK_PORT is not a port: '{port}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_keys.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.access_keys must contain at least one key".into(),
            ));
        }
        if self.auth.refresh_keys.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.refresh_keys must contain at least one key".into(),
            ));
        }
        if self
            .auth
            .access_keys
            .iter()
            .any(|k| self.auth.refresh_keys.contains(k))
        {
            return Err(ConfigError::ValidationError(
                "auth.access_keys and auth.refresh_keys must be disjoint".into(),
            ));
        }
        if self.auth.access_ttl_minutes < 1 || self.auth.refresh_ttl_days < 1 {
            return Err(ConfigError::ValidationError(
                "token TTLs must be positive".into(),
            ));
        }
        if self.gateway.rate_limit_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.rate_limit_per_minute must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            database: DatabaseConfig::default(),
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            scorer: ScorerConfig::default(),
            email: EmailConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
