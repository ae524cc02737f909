//! Read-only inspection of the cache: classification, verification, stats.
//!
//! Nothing here touches the network or mutates the store. Classification
//! goes through [`KeyStatus::state`] so it always agrees with the skip
//! decision made by the cache manager.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{CacheStore, KeyState};
use crate::models::{CacheKey, KeyRange};

/// Disjoint partition of a key range by cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub complete: Vec<CacheKey>,
    pub incomplete: Vec<CacheKey>,
    pub empty: Vec<CacheKey>,
    pub missing: Vec<CacheKey>,
}

impl Analysis {
    pub fn total(&self) -> usize {
        self.complete.len() + self.incomplete.len() + self.empty.len() + self.missing.len()
    }

    /// Keys a "download missing" run should target, in ascending order.
    pub fn targets(&self, retry_failed: bool) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .incomplete
            .iter()
            .chain(&self.missing)
            .copied()
            .collect();
        if retry_failed {
            keys.extend(self.empty.iter().copied());
        }
        keys.sort();
        keys
    }
}

pub fn analyze(store: &CacheStore, range: KeyRange) -> Result<Analysis> {
    let mut analysis = Analysis::default();
    for key in range.keys() {
        match store.key_status(key)?.state() {
            KeyState::Complete => analysis.complete.push(key),
            KeyState::Empty => analysis.empty.push(key),
            KeyState::Incomplete => analysis.incomplete.push(key),
            KeyState::Missing => analysis.missing.push(key),
        }
    }
    debug!(
        range = %range,
        complete = analysis.complete.len(),
        incomplete = analysis.incomplete.len(),
        empty = analysis.empty.len(),
        missing = analysis.missing.len(),
        "Range analyzed"
    );
    Ok(analysis)
}

/// One inconsistency found by [`verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyIssue {
    pub key: CacheKey,
    pub problem: String,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub checked: usize,
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check that every key with metadata has exactly the images it lists.
pub fn verify(store: &CacheStore, range: KeyRange) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for key in range.keys() {
        let status = store.key_status(key)?;
        if !status.exists {
            continue;
        }
        report.checked += 1;
        let mut issue = |problem: String| report.issues.push(VerifyIssue { key, problem });

        if !status.has_metadata {
            if status.file_count > 0 && !status.has_empty_marker {
                issue(format!("{} image(s) present without metadata", status.file_count));
            }
            continue;
        }

        let metadata = match store.load_key_metadata(key) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => continue,
            Err(e) => {
                issue(format!("unreadable metadata: {:#}", e));
                continue;
            }
        };

        if metadata.pokedex_number != key.get() {
            issue(format!(
                "metadata is for #{:04}, not this key",
                metadata.pokedex_number
            ));
        }
        if metadata.cards.len() != status.file_count {
            issue(format!(
                "metadata lists {} card(s) but {} image(s) on disk",
                metadata.cards.len(),
                status.file_count
            ));
        }
        let dir = store.key_dir(key);
        for card in &metadata.cards {
            if !dir.join(&card.filename).is_file() {
                issue(format!("missing image {}", card.filename));
            }
        }
    }

    Ok(report)
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub complete: usize,
    pub empty: usize,
    pub incomplete: usize,
    pub missing: usize,
    pub images: usize,
    pub bytes: u64,
    pub last_update: Option<DateTime<Utc>>,
}

pub fn stats(store: &CacheStore, range: KeyRange) -> Result<CacheStats> {
    let mut stats = CacheStats {
        last_update: store.load_global_metadata()?.last_update,
        ..CacheStats::default()
    };
    for key in range.keys() {
        let status = store.key_status(key)?;
        match status.state() {
            KeyState::Complete => stats.complete += 1,
            KeyState::Empty => stats.empty += 1,
            KeyState::Incomplete => stats.incomplete += 1,
            KeyState::Missing => stats.missing += 1,
        }
        if status.file_count > 0 {
            stats.images += status.file_count;
            stats.bytes += store.key_disk_usage(key)?;
        }
    }
    Ok(stats)
}
