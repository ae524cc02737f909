//! Core library for cardcache.
//!
//! Builds and maintains an on-disk cache of trading-card images keyed by
//! national pokedex number. Cards come either from the remote query API or
//! from a bulk dataset clone, are narrowed to a set-diverse selection, and
//! are downloaded into one directory per key.

pub mod analyzer;
pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod scheduler;
pub mod selector;
pub mod source;

#[cfg(test)]
mod test_helpers;

pub use analyzer::{Analysis, CacheStats, VerifyIssue, VerifyReport};
pub use api::{ApiClient, ApiError, RetryPolicy};
pub use cache::{CacheManager, CacheStore, KeyState, KeyStatus, ProcessOutcome};
pub use config::{Config, RunOptions};
pub use models::{CacheKey, KeyRange};
pub use scheduler::{RangeScheduler, RunStatistics};
pub use source::{BulkDataset, BulkSource, CardSource, RemoteSource, SourceMode};
