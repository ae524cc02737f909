use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::{CacheStore, ImageBlob};
use crate::api::{sleep_or_cancel, with_retry, ApiError, ImageFetcher, RetryPolicy};
use crate::config::RunOptions;
use crate::models::CacheKey;
use crate::selector;
use crate::source::CardSource;

/// Marker reason for keys whose source returned nothing
pub const NO_CANDIDATES_REASON: &str = "no candidates found";

/// Result of processing one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// The key was already complete and nothing was fetched
    pub skipped: bool,
    /// Images now cached for the key
    pub count: usize,
}

/// Per-key orchestration: decide, fetch candidates, select, download, persist.
pub struct CacheManager {
    store: CacheStore,
    source: Arc<dyn CardSource>,
    fetcher: Arc<dyn ImageFetcher>,
    options: RunOptions,
    cancel: CancellationToken,
}

impl CacheManager {
    pub fn new(
        store: CacheStore,
        source: Arc<dyn CardSource>,
        fetcher: Arc<dyn ImageFetcher>,
        options: RunOptions,
    ) -> Self {
        Self {
            store,
            source,
            fetcher,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller (e.g. a Ctrl-C handler).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Bring one key up to date.
    ///
    /// Complete keys are skipped without any network call unless `force` is
    /// set. A source failure (after retries) or an empty download set leaves
    /// an empty marker behind and is reported as an error. A source that
    /// returns no candidates is a valid outcome with a count of zero.
    pub async fn process(&self, key: CacheKey) -> Result<ProcessOutcome> {
        if !self.options.force {
            let status = self.store.key_status(key)?;
            if status.is_complete() {
                debug!(key = %key, files = status.file_count, "Already cached, skipping");
                return Ok(ProcessOutcome {
                    skipped: true,
                    count: status.file_count,
                });
            }
        }

        let policy = if self.source.mode().is_retryable() {
            self.options.retry
        } else {
            RetryPolicy::none()
        };
        let limit = self.options.limit;

        let candidates = match with_retry(&policy, &self.cancel, "card query", || {
            self.source.fetch_candidates(key, limit)
        })
        .await
        {
            Ok(candidates) => candidates,
            Err(ApiError::Cancelled) => return Err(anyhow!(ApiError::Cancelled)),
            Err(e) => {
                self.mark_failed(key, &format!("candidate lookup failed: {}", e));
                return Err(anyhow!(e))
                    .with_context(|| format!("Failed to fetch cards for {}", key));
            }
        };

        if candidates.is_empty() {
            info!(key = %key, "No cards found");
            self.store.write_empty_marker(key, NO_CANDIDATES_REASON)?;
            return Ok(ProcessOutcome {
                skipped: false,
                count: 0,
            });
        }

        let chosen = selector::select(&candidates, limit);
        debug!(
            key = %key,
            candidates = candidates.len(),
            chosen = chosen.len(),
            "Selected cards"
        );

        let mut blobs = Vec::with_capacity(chosen.len());
        for (i, card) in chosen.into_iter().enumerate() {
            if i > 0 && sleep_or_cancel(&self.cancel, self.options.delay).await {
                return Err(anyhow!(ApiError::Cancelled));
            }
            let fetched = with_retry(&self.options.retry, &self.cancel, "image download", || {
                self.fetcher.fetch_image(&card.image_url)
            })
            .await;
            match fetched {
                Ok(bytes) => {
                    info!(key = %key, card = %card.id, set = %card.set_name, "Downloaded image");
                    blobs.push(ImageBlob { bytes, card });
                }
                Err(ApiError::Cancelled) => return Err(anyhow!(ApiError::Cancelled)),
                Err(e) => {
                    warn!(
                        key = %key,
                        card = %card.id,
                        url = %card.image_url,
                        error = %e,
                        "Image download failed, skipping"
                    );
                }
            }
        }

        let attempted = candidates.len().min(limit);
        if blobs.is_empty() {
            self.mark_failed(key, &format!("all {} image downloads failed", attempted));
            bail!("all {} image downloads failed for {}", attempted, key);
        }

        let written = self.store.write_cards(key, blobs)?;
        if written.is_empty() {
            self.mark_failed(key, "no images could be written");
            bail!("no images could be written for {}", key);
        }

        info!(key = %key, count = written.len(), "Cached cards");
        Ok(ProcessOutcome {
            skipped: false,
            count: written.len(),
        })
    }

    /// Leave an empty marker on a key that is about to be reported as
    /// failed. The caller's error takes precedence over a marker write error.
    fn mark_failed(&self, key: CacheKey, reason: &str) {
        if let Err(e) = self.store.write_empty_marker(key, reason) {
            warn!(key = %key, reason, error = %format!("{:#}", e), "Failed to write empty marker");
        }
    }
}

/// True when an error returned by [`CacheManager::process`] stems from cancellation.
pub fn is_cancelled(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Cancelled)))
}

// ============================================================================
// Tests
// ============================================================================
