use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CacheKey, CachedCard};

/// Version string recorded in the global metadata file.
pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Contents of `<root>/<key>/metadata.json`. Its presence marks a key complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerKeyMetadata {
    #[serde(rename = "pokedexNumber")]
    pub pokedex_number: u32,
    pub cards: Vec<CachedCard>,
    #[serde(rename = "downloadedAt")]
    pub downloaded_at: DateTime<Utc>,
}

impl PerKeyMetadata {
    pub fn new(key: CacheKey, cards: Vec<CachedCard>) -> Self {
        Self {
            pokedex_number: key.get(),
            cards,
            downloaded_at: Utc::now(),
        }
    }
}

/// Contents of `<root>/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetadata {
    /// Reserved per-key index; always written as an object.
    #[serde(default)]
    pub pokemon: Map<String, Value>,
    #[serde(rename = "lastUpdate", default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: String,
}

impl Default for GlobalMetadata {
    fn default() -> Self {
        Self {
            pokemon: Map::new(),
            last_update: None,
            version: CACHE_VERSION.to_string(),
        }
    }
}

impl GlobalMetadata {
    /// Stamp the record with the current time and crate version.
    pub fn touch(&mut self) {
        self.last_update = Some(Utc::now());
        self.version = CACHE_VERSION.to_string();
    }

    pub fn last_update_display(&self) -> String {
        self.last_update
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    }
}
