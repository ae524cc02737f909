//! Card candidate sources.
//!
//! Two interchangeable strategies produce candidates for a key:
//! - `RemoteSource`: one filtered, newest-first query per key
//! - `BulkSource`: lookups into a dataset loaded once from a local clone
//!
//! Both return the same `CardCandidate` shape so selection is source-agnostic.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::models::{CacheKey, CardCandidate};

pub mod bulk;
pub mod remote;

pub use bulk::{ensure_dataset_ready, BulkDataset, BulkSource, DEFAULT_DATASET_REPO};
pub use remote::RemoteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Remote,
    Bulk,
}

impl SourceMode {
    /// Only network-backed lookups can fail transiently.
    pub fn is_retryable(self) -> bool {
        matches!(self, SourceMode::Remote)
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Remote => write!(f, "remote"),
            SourceMode::Bulk => write!(f, "bulk"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "remote" | "api" => Ok(SourceMode::Remote),
            "bulk" | "local" => Ok(SourceMode::Bulk),
            other => anyhow::bail!("unknown data source '{}' (expected remote or bulk)", other),
        }
    }
}

/// Capability shared by every candidate source.
#[async_trait]
pub trait CardSource: Send + Sync {
    fn mode(&self) -> SourceMode;

    /// Candidates for `key`, best first. `limit` is a hint for how many the
    /// caller intends to keep; sources may return more.
    async fn fetch_candidates(
        &self,
        key: CacheKey,
        limit: usize,
    ) -> Result<Vec<CardCandidate>, ApiError>;
}
