//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$PHISHTRIAGE_CONFIG` (environment variable)
//! 2. `~/.config/phishtriage/config.toml` (Linux/macOS)
//!    `%APPDATA%\phishtriage\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::text::{NormalizerConfig, StemmerKind, StopWords};
use crate::triage::ScanOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Fitted artifact locations.
    pub model: ModelConfig,
    /// Text normalization; must match training.
    pub normalizer: NormalizerSettings,
    /// Scan and labeling behavior.
    pub scan: ScanConfig,
    /// Gmail API backend.
    pub gmail: GmailConfig,
    /// IMAP backend.
    pub imap: ImapConfig,
    /// Local MBOX backend.
    pub mbox: MboxConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Fitted artifact locations and optional pinned digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub vectorizer_path: PathBuf,
    pub classifier_path: PathBuf,
    /// Expected hex SHA-256 of the vectorizer file.
    pub vectorizer_sha256: Option<String>,
    /// Expected hex SHA-256 of the classifier file.
    pub classifier_sha256: Option<String>,
}

/// Normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    pub stop_words: StopWords,
    pub extra_stop_words: Vec<String>,
    pub stemmer: StemmerKind,
}

/// Scan and labeling behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Messages per scan.
    pub max_messages: usize,
    /// Minutes between scans in watch mode.
    pub interval_minutes: u64,
    /// Label attached to every phishing message.
    pub phishing_label: String,
    /// Also attach one label per reason.
    pub label_reasons: bool,
    /// Prefix for reason labels.
    pub reason_label_prefix: String,
}

/// Gmail API backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// OAuth token file produced by the consent flow.
    pub token_path: PathBuf,
    pub user_id: String,
    pub api_base: String,
    /// Label whose messages are scanned.
    pub inbox_label: String,
    pub timeout_secs: u64,
}

/// IMAP backend (implicit TLS, app-password login).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// App password. Prefer `password_env` over storing it here.
    pub password: Option<String>,
    /// Environment variable holding the app password.
    pub password_env: String,
    /// Folder whose messages are scanned.
    pub folder: String,
    pub timeout_secs: u64,
}

/// Local MBOX backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MboxConfig {
    /// MBOX file used when none is given on the command line.
    pub path: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vectorizer_path: PathBuf::from("vectorizer.json"),
            classifier_path: PathBuf::from("phishing_model.json"),
            vectorizer_sha256: None,
            classifier_sha256: None,
        }
    }
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            stop_words: StopWords::English,
            extra_stop_words: Vec::new(),
            stemmer: StemmerKind::Porter,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            interval_minutes: 45,
            phishing_label: "Phishing".to_string(),
            label_reasons: true,
            reason_label_prefix: "Reason: ".to_string(),
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            user_id: "me".to_string(),
            api_base: "https://gmail.googleapis.com".to_string(),
            inbox_label: "INBOX".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
            username: String::new(),
            password: None,
            password_env: "PHISHTRIAGE_IMAP_PASSWORD".to_string(),
            folder: "INBOX".to_string(),
            timeout_secs: 30,
        }
    }
}

// ── Conversions ─────────────────────────────────────────────────

impl NormalizerSettings {
    pub fn to_normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig::new(self.stop_words, &self.extra_stop_words, self.stemmer)
    }
}

impl ScanConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            phishing_label: self.phishing_label.clone(),
            label_reasons: self.label_reasons,
            reason_label_prefix: self.reason_label_prefix.clone(),
            dry_run: false,
        }
    }

    pub fn interval(&self) -> Duration {
        minutes(self.interval_minutes)
    }
}

/// Whole minutes as a duration, saturating instead of overflowing.
pub fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

impl GmailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ImapConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured password, else the one in `password_env`.
    pub fn resolve_password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var(&self.password_env).ok())
            .filter(|p| !p.is_empty())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit file. Unlike [`load_config`], a
/// missing or malformed file is an error.
pub fn load_config_from(path: &std::path::Path) -> crate::error::Result<Config> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| crate::error::TriageError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| crate::error::TriageError::Config(format!("{}: {e}", path.display())))
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("PHISHTRIAGE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("phishtriage").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phishtriage")
}
