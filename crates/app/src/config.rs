//! Application configuration
//!
//! Loaded from `youthnet.toml` in the platform config directory, or from
//! the path in `YOUTHNET_CONFIG`. Every field has a default, so a missing
//! file yields a usable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use youthnet_net::BackendConfig;

use crate::notifications::FeedLimits;
use crate::session::SessionTimeouts;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "YOUTHNET_CONFIG";
/// Environment override for the backend URL
pub const BACKEND_URL_ENV: &str = "YOUTHNET_BACKEND_URL";
/// Environment override for the anon key
pub const ANON_KEY_ENV: &str = "YOUTHNET_ANON_KEY";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Could not determine platform directories")]
    NoProjectDirs,
}

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendSection,
    pub session: SessionSection,
    pub notifications: NotificationSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub url: String,
    pub anon_key: String,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub profile_fetch_timeout_secs: u64,
    pub sign_out_fallback_secs: u64,
    pub sign_out_transition_secs: u64,
    pub login_timeout_secs: u64,
    pub profile_refresh_interval_secs: u64,
    pub audit_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            profile_fetch_timeout_secs: 15,
            sign_out_fallback_secs: 5,
            sign_out_transition_secs: 2,
            login_timeout_secs: 10,
            profile_refresh_interval_secs: 30,
            audit_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub poll_interval_secs: u64,
    pub new_members: u32,
    pub security_alerts: u32,
    pub posts: u32,
    pub registrations: u32,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            new_members: 10,
            security_alerts: 5,
            posts: 5,
            registrations: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding the local database; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default location, then apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::project_dirs()?.config_dir().join("youthnet.toml"),
        };
        let mut config = Self::load_from_path(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BACKEND_URL_ENV) {
            self.backend.url = url;
        }
        if let Some(key) = lookup(ANON_KEY_ENV) {
            self.backend.anon_key = key;
        }
    }

    fn project_dirs() -> Result<ProjectDirs, ConfigError> {
        ProjectDirs::from("org", "youthnet", "youthnet-admin").ok_or(ConfigError::NoProjectDirs)
    }

    /// Directory holding the local database
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            url: self.backend.url.clone(),
            anon_key: self.backend.anon_key.clone(),
        }
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        let s = &self.session;
        SessionTimeouts {
            profile_fetch: Duration::from_secs(s.profile_fetch_timeout_secs),
            sign_out_fallback: Duration::from_secs(s.sign_out_fallback_secs),
            sign_out_transition: Duration::from_secs(s.sign_out_transition_secs),
            login: Duration::from_secs(s.login_timeout_secs),
            profile_refresh_interval: Duration::from_secs(s.profile_refresh_interval_secs),
            audit_write: Duration::from_secs(s.audit_timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.notifications.poll_interval_secs)
    }

    pub fn feed_limits(&self) -> FeedLimits {
        let n = &self.notifications;
        FeedLimits {
            new_members: n.new_members,
            security_alerts: n.security_alerts,
            posts: n.posts,
            registrations: n.registrations,
        }
    }
}
