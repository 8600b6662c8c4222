use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub default_lang: Option<String>,
    pub default_format: Option<String>,
    pub default_model: Option<String>,
    pub youtube_api_keys: Vec<String>,
    pub summary_style: Option<String>,
    pub summary_format: Option<String>,
    pub summary_max_length: Option<u32>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config from ~/.config/ytsum/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    /// Configured keys followed by `YOUTUBE_API_KEYS` and `YOUTUBE_API_KEY`, deduplicated in order.
    pub fn api_keys(&self) -> Vec<String> {
        merge_keys(
            &self.youtube_api_keys,
            std::env::var("YOUTUBE_API_KEYS").ok().as_deref(),
            std::env::var("YOUTUBE_API_KEY").ok().as_deref(),
        )
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

fn merge_keys(configured: &[String], list: Option<&str>, single: Option<&str>) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let from_env = list.into_iter().flat_map(|l| l.split(',')).chain(single);
    for key in configured.iter().map(String::as_str).chain(from_env) {
        let key = key.trim();
        if !key.is_empty() && !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytsum")
        .join("config.toml")
}
