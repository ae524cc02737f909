//! Application configuration management.
//!
//! `Config` holds the persistent settings (cache location, API endpoint and
//! key, bulk dataset location), stored at `~/.config/cardcache/config.json`.
//! `RunOptions` is the immutable per-invocation configuration handed to the
//! cache manager and scheduler after validation at the command boundary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{RetryPolicy, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::models::DEFAULT_MAX_KEY;
use crate::source::{SourceMode, DEFAULT_DATASET_REPO};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "cardcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable carrying the query API key
pub const API_KEY_ENV: &str = "POKEMONTCG_API_KEY";

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "CARDCACHE_DIR";

/// Default number of images cached per key
pub const DEFAULT_LIMIT: usize = 5;

/// Default pause between keys (or chunks) in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cache_dir: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub dataset_dir: Option<PathBuf>,
    pub dataset_repo: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_key: Option<u32>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.cache_dir = Some(PathBuf::from(dir));
            }
        }
    }

    fn app_cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Root of the card image cache.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match self.cache_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::app_cache_dir()?.join("cards")),
        }
    }

    /// Location of the bulk dataset clone.
    pub fn dataset_dir(&self) -> Result<PathBuf> {
        match self.dataset_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::app_cache_dir()?.join("pokemon-tcg-data")),
        }
    }

    pub fn dataset_repo(&self) -> &str {
        self.dataset_repo.as_deref().unwrap_or(DEFAULT_DATASET_REPO)
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn max_key(&self) -> u32 {
        self.max_key.unwrap_or(DEFAULT_MAX_KEY)
    }
}

/// Per-invocation settings for downloads. Build once, `validate`, then share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum images cached per key
    pub limit: usize,
    /// Reprocess keys that are already complete
    pub force: bool,
    /// Pause between keys (sequential) or chunks (concurrent), and between
    /// image downloads within a key
    pub delay: Duration,
    /// Keys processed at once; 1 means strictly sequential
    pub concurrency: usize,
    /// Include empty-marked keys when downloading missing keys
    pub retry_failed: bool,
    pub source: SourceMode,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            force: false,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            concurrency: 1,
            retry_failed: false,
            source: SourceMode::Remote,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    pub fn validate(self) -> Result<Self> {
        if self.limit == 0 {
            bail!("limit must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry attempts must be at least 1");
        }
        Ok(self)
    }
}
