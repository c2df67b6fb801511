use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub list_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub storage_quota_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub default_limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            request_timeout_seconds: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_ttl_seconds: 300,
            sweep_interval_seconds: 300,
            // same order as browser local storage
            storage_quota_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl CacheConfig {
    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl DeskConfig {
    /// `~/.config/bizu-desk`, created on demand.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("bizu-desk");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Loads the configuration file, or writes and returns the defaults.
    pub fn load() -> Self {
        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "could not load configuration, using defaults");
                let default_config = Self::default();
                if let Err(save_err) = default_config.save() {
                    warn!(error = %save_err, "could not save default configuration");
                }
                default_config
            }
        }
    }

    fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = Self::config_file_path()?;
        let config_content = std::fs::read_to_string(config_path)?;
        Ok(serde_json::from_str(&config_content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_file_path()?;
        let config_json = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, config_json)?;
        Ok(())
    }

    /// Applies `BIZU_BASE_URL` and `BIZU_API_KEY` when set.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BIZU_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Ok(key) = std::env::var("BIZU_API_KEY") {
            self.backend.api_key = Some(key);
        }
    }
}
