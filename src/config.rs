use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sampler::SamplerSettings;
use crate::stats::DEFAULT_WINDOW;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid endpoint {0:?}: must be an http(s) URL")]
    InvalidEndpoint(String),
    #[error("invalid setting: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub window_size: usize,
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ping.qlaffont.com".to_string(),
            timeout_ms: 999,
            interval_ms: 1000,
            window_size: DEFAULT_WINDOW,
            event_capacity: 64,
        }
    }
}

impl AppConfig {
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("StabilityTest");

        fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.json"))
    }

    /// Loads the user config, falling back to defaults when it is missing or unusable.
    pub fn load() -> Self {
        let loaded = Self::get_config_path().and_then(|path| {
            if path.exists() {
                Self::load_from(&path)
            } else {
                Ok(Self::default())
            }
        });

        loaded.unwrap_or_else(|e| {
            warn!("using default config: {e}");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive"));
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        match Url::parse(self.endpoint.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
            _ => Err(ConfigError::InvalidEndpoint(self.endpoint.clone())),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_millis(self.interval_ms),
            window_size: self.window_size,
            event_capacity: self.event_capacity,
        }
    }
}
