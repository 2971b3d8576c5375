//! DataShed configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DatashedError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatashedConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl DatashedConfig {
    /// Load config from the default path (~/.datashed/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DatashedError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DatashedError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DatashedError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the DataShed home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".datashed")
    }
}

/// Site identity, used in email signatures and From headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_title")]
    pub title: String,
    #[serde(default = "default_site_url")]
    pub url: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

fn default_site_title() -> String { "DataShed".into() }
fn default_site_url() -> String { "http://localhost:5000".into() }
fn default_from_address() -> String { "info@datashed.local".into() }

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_site_title(),
            url: default_site_url(),
            from_address: default_from_address(),
        }
    }
}

/// Batch notifier behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Digest subject line.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Whether viewing the dashboard satisfies a pending
    /// notification. With this off, only the notified watermark and
    /// enablement time bound the digest window.
    #[serde(default = "bool_true")]
    pub suppress_seen: bool,
    /// Interval between runs in watch mode.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_subject() -> String { "You have new activity".into() }
fn default_check_interval() -> u64 { 3600 }
fn bool_true() -> bool { true }

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            suppress_seen: true,
            check_interval_secs: default_check_interval(),
        }
    }
}

/// SMTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_smtp_host() -> String { "localhost".into() }
fn default_smtp_port() -> u16 { 587 }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Where the SQLite store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String { "~/.datashed/datashed.db".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

impl StorageConfig {
    /// Expand a leading `~` to the home directory.
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(rest)
        } else {
            PathBuf::from(&self.db_path)
        }
    }
}
