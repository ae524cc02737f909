//! Explicit cleanup passes. The download path never deletes key directories.

use anyhow::Result;
use tracing::info;

use super::{CacheStore, KeyState};
use crate::models::CacheKey;

/// Remove key directories left incomplete (images without metadata or marker).
pub fn clean_incomplete(
    store: &CacheStore,
    keys: impl IntoIterator<Item = CacheKey>,
) -> Result<Vec<CacheKey>> {
    let mut removed = Vec::new();
    for key in keys {
        if store.key_status(key)?.state() == KeyState::Incomplete && store.remove_key(key)? {
            info!(key = %key, "Removed incomplete key");
            removed.push(key);
        }
    }
    Ok(removed)
}

/// Remove key directories that hold no images or only an empty marker.
pub fn clean_empty(
    store: &CacheStore,
    keys: impl IntoIterator<Item = CacheKey>,
) -> Result<Vec<CacheKey>> {
    let mut removed = Vec::new();
    for key in keys {
        if store.remove_if_empty_or_marked(key)? {
            info!(key = %key, "Removed empty key");
            removed.push(key);
        }
    }
    Ok(removed)
}
