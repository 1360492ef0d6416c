use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://partners-api.airalo.com/v2/packages".to_string(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            SyncError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Fall back to built-in defaults when no config file is present. The
    /// catalog URL can always be overridden via ESIM_CATALOG_URL.
    pub fn load_or_default() -> Self {
        let mut config = Self::load().unwrap_or_else(|_| Config {
            upstream: UpstreamConfig::default(),
        });
        if let Ok(url) = std::env::var("ESIM_CATALOG_URL") {
            config.upstream.base_url = url;
        }
        config
    }
}
