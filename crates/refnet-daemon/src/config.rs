//! Configuration file management.
//!
//! `config.toml` lives in the data directory. Every field has a default so a
//! partial file (or no file) still loads; [`DaemonConfig::validate`] runs
//! after environment overrides are applied.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use refnet_types::clock::LocalZone;
use serde::{Deserialize, Serialize};

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "REFNET_DATA_DIR";
pub const BACKEND_URL_ENV: &str = "REFNET_BACKEND_URL";
pub const ANON_KEY_ENV: &str = "REFNET_ANON_KEY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backend.url is not set")]
    MissingUrl,

    #[error("backend.anon_key is not set")]
    MissingAnonKey,

    #[error("backend.url must be an http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("admin.listen_addr is not a socket address: {0}")]
    InvalidListenAddr(String),

    #[error("app.timezone is not a known zone: {0}")]
    InvalidTimezone(String),
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Remote store and identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    /// Enables the admin endpoint when set.
    #[serde(default)]
    pub service_role_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin used to build referral links.
    #[serde(default = "default_site_origin")]
    pub site_origin: String,
    #[serde(default = "default_history_limit")]
    pub transfer_history_limit: u32,
    /// IANA zone for income day boundaries. Empty = machine zone.
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
}

fn default_timeout_secs() -> u64 {
    refnet_store::DEFAULT_TIMEOUT_SECS
}

fn default_site_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_history_limit() -> u32 {
    refnet_dashboard::controller::DEFAULT_HISTORY_LIMIT
}

fn default_listen_addr() -> String {
    "127.0.0.1:8790".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_role_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site_origin: default_site_origin(),
            transfer_history_limit: default_history_limit(),
            timezone: String::new(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

impl DaemonConfig {
    /// Load from the default location and apply environment overrides.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `REFNET_*` overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(BACKEND_URL_ENV).filter(|v| !v.is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = var(ANON_KEY_ENV).filter(|v| !v.is_empty()) {
            self.backend.anon_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.backend.url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidUrl(url.to_string())),
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err(ConfigError::MissingAnonKey);
        }
        if self.admin_enabled() {
            self.admin_addr()?;
        }
        self.zone()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// The admin listener runs only when enabled and a service-role key exists.
    pub fn admin_enabled(&self) -> bool {
        self.admin.enabled
            && self
                .backend
                .service_role_key
                .as_deref()
                .is_some_and(|k| !k.is_empty())
    }

    pub fn admin_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.admin
            .listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.admin.listen_addr.clone()))
    }

    pub fn zone(&self) -> Result<LocalZone, ConfigError> {
        LocalZone::parse(&self.app.timezone)
            .map_err(|_| ConfigError::InvalidTimezone(self.app.timezone.clone()))
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Refnet")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Refnet")
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs_fallback(".refnet")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/refnet"))
}
