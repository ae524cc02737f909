//! In-memory stand-ins for the network-facing traits.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiError, ImageFetcher, RetryPolicy};
use crate::models::{CacheKey, CardCandidate};
use crate::source::{CardSource, SourceMode};

pub fn key(n: u32) -> CacheKey {
    CacheKey::new(n).unwrap()
}

pub fn card(id: &str, set: &str) -> CardCandidate {
    CardCandidate {
        id: id.to_string(),
        name: format!("Card {}", id),
        set_id: set.to_string(),
        set_name: format!("Set {}", set),
        rarity: Some("Common".to_string()),
        image_url: format!("https://images.test/{}.png", id),
        release_date: None,
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        jitter: false,
    }
}

/// Candidate source backed by a map; keys listed in `failing` always error.
pub struct FakeSource {
    mode: SourceMode,
    cards: HashMap<u32, Vec<CardCandidate>>,
    failing: HashSet<u32>,
    calls: AtomicUsize,
    seen: Mutex<Vec<u32>>,
}

impl FakeSource {
    pub fn new(mode: SourceMode) -> Self {
        Self {
            mode,
            cards: HashMap::new(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cards(mut self, key: u32, cards: Vec<CardCandidate>) -> Self {
        self.cards.insert(key, cards);
        self
    }

    pub fn failing_on(mut self, key: u32) -> Self {
        self.failing.insert(key);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys queried so far, sorted.
    pub fn seen_keys(&self) -> Vec<u32> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort_unstable();
        seen.dedup();
        seen
    }
}

#[async_trait]
impl CardSource for FakeSource {
    fn mode(&self) -> SourceMode {
        self.mode
    }

    async fn fetch_candidates(
        &self,
        key: CacheKey,
        _limit: usize,
    ) -> Result<Vec<CardCandidate>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(key.get());
        // Yield so concurrent tasks interleave.
        tokio::task::yield_now().await;
        if self.failing.contains(&key.get()) {
            return Err(ApiError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.cards.get(&key.get()).cloned().unwrap_or_default())
    }
}

/// Image fetcher that returns the URL bytes, except for URLs marked broken.
#[derive(Default)]
pub struct FakeFetcher {
    broken: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.broken.contains(url) {
            return Err(ApiError::NotFound(url.to_string()));
        }
        Ok(url.as_bytes().to_vec())
    }
}
