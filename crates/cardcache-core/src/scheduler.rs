//! Range scheduler: drives the cache manager over a closed key interval.
//!
//! With `concurrency <= 1` keys run strictly in order with the configured
//! delay between them. Otherwise keys are split into chunks of
//! `concurrency`; each chunk runs concurrently and the delay is inserted
//! between chunks. Keys within a chunk are distinct, so no two tasks ever
//! touch the same key directory. Results are folded after each `join_all`,
//! so the statistics have a single writer.

use anyhow::Result;
use tracing::{info, warn};

use crate::analyzer::{self, Analysis};
use crate::api::sleep_or_cancel;
use crate::cache::{is_cancelled, CacheManager, ProcessOutcome};
use crate::models::{CacheKey, KeyRange};

/// Counters for one scheduler invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Keys that reached a result (success, empty, skipped or failed)
    pub total: usize,
    /// Keys that ended with at least one newly cached image
    pub success: usize,
    /// Keys whose source had no cards
    pub empty: usize,
    /// Keys already complete
    pub skipped: usize,
    pub failed: usize,
    /// Images written during this run
    pub images: usize,
    /// The run was interrupted before every key was processed
    pub cancelled: bool,
}

impl RunStatistics {
    fn record(&mut self, key: CacheKey, result: Result<ProcessOutcome>) {
        match result {
            Ok(outcome) if outcome.skipped => {
                self.total += 1;
                self.skipped += 1;
            }
            Ok(outcome) if outcome.count == 0 => {
                self.total += 1;
                self.empty += 1;
            }
            Ok(outcome) => {
                self.total += 1;
                self.success += 1;
                self.images += outcome.count;
            }
            Err(e) if is_cancelled(&e) => {
                self.cancelled = true;
            }
            Err(e) => {
                self.total += 1;
                self.failed += 1;
                warn!(key = %key, error = %format!("{:#}", e), "Key failed");
            }
        }
    }
}

pub struct RangeScheduler {
    manager: CacheManager,
}

impl RangeScheduler {
    pub fn new(manager: CacheManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    /// Process every key of `range`.
    pub async fn run(&self, range: KeyRange) -> Result<RunStatistics> {
        let keys: Vec<CacheKey> = range.keys().collect();
        info!(range = %range, keys = keys.len(), "Starting download run");
        self.run_keys(&keys).await
    }

    /// Process only the keys of `range` that are not complete: incomplete
    /// and missing keys, plus empty-marked keys when `retry_failed` is set.
    pub async fn download_missing(&self, range: KeyRange) -> Result<(Analysis, RunStatistics)> {
        let analysis = analyzer::analyze(self.manager.store(), range)?;
        let targets = analysis.targets(self.manager.options().retry_failed);
        info!(
            range = %range,
            complete = analysis.complete.len(),
            targets = targets.len(),
            "Downloading missing keys"
        );
        let stats = self.run_keys(&targets).await?;
        Ok((analysis, stats))
    }

    /// Process an explicit key list, then bump the global metadata.
    pub async fn run_keys(&self, keys: &[CacheKey]) -> Result<RunStatistics> {
        let stats = if self.manager.options().concurrency <= 1 {
            self.run_sequential(keys).await
        } else {
            self.run_chunked(keys).await
        };

        let store = self.manager.store();
        let mut global = store.load_global_metadata()?;
        global.touch();
        store.save_global_metadata(&global)?;

        if stats.cancelled {
            warn!(processed = stats.total, requested = keys.len(), "Run interrupted");
        }
        Ok(stats)
    }

    async fn run_sequential(&self, keys: &[CacheKey]) -> RunStatistics {
        let cancel = self.manager.cancel_token();
        let delay = self.manager.options().delay;
        let mut stats = RunStatistics::default();

        for (i, &key) in keys.iter().enumerate() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            info!(key = %key, progress = %format!("{}/{}", i + 1, keys.len()), "Processing");
            let result = self.manager.process(key).await;
            let cached = matches!(result, Ok(ProcessOutcome { skipped: true, .. }));
            stats.record(key, result);

            let more = i + 1 < keys.len();
            if more && !cached && sleep_or_cancel(cancel, delay).await {
                stats.cancelled = true;
                break;
            }
        }
        stats
    }

    async fn run_chunked(&self, keys: &[CacheKey]) -> RunStatistics {
        let cancel = self.manager.cancel_token();
        let options = self.manager.options();
        let mut stats = RunStatistics::default();
        let chunk_count = keys.len().div_ceil(options.concurrency);

        for (i, chunk) in keys.chunks(options.concurrency).enumerate() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            info!(
                chunk = %format!("{}/{}", i + 1, chunk_count),
                first = %chunk[0],
                size = chunk.len(),
                "Processing chunk"
            );

            let futures: Vec<_> = chunk
                .iter()
                .map(|&key| async move { (key, self.manager.process(key).await) })
                .collect();
            let results = futures::future::join_all(futures).await;

            let mut all_cached = true;
            for (key, result) in results {
                all_cached &= matches!(result, Ok(ProcessOutcome { skipped: true, .. }));
                stats.record(key, result);
            }

            let more = i + 1 < chunk_count;
            if more && !all_cached && sleep_or_cancel(cancel, options.delay).await {
                stats.cancelled = true;
                break;
            }
        }
        stats
    }
}
