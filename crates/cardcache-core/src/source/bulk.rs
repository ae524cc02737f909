//! Bulk dataset source.
//!
//! The dataset is a local clone of the pokemon-tcg-data repository:
//!
//! ```text
//! <dir>/sets/en.json          [{ id, name, releaseDate, ... }, ...]
//! <dir>/cards/en/<setId>.json [{ id, name, supertype, nationalPokedexNumbers, images, ... }, ...]
//! ```
//!
//! It is read once into a key-indexed map; lookups afterwards do no I/O.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{CardSource, SourceMode};
use crate::api::ApiError;
use crate::models::{ApiCard, CacheKey, CardCandidate};

/// Default upstream for the bulk dataset clone
pub const DEFAULT_DATASET_REPO: &str = "https://github.com/PokemonTCG/pokemon-tcg-data.git";

const CARDS_DIR: &str = "cards/en";
const SETS_FILE: &str = "sets/en.json";

#[derive(Debug, Deserialize)]
struct SetRecord {
    id: String,
    name: String,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
}

/// In-memory index from key to candidates, built once per process.
#[derive(Debug, Default)]
pub struct BulkDataset {
    by_key: HashMap<u32, Vec<CardCandidate>>,
    card_count: usize,
}

impl BulkDataset {
    /// Read every card file under `dir` and index it by pokedex number.
    pub fn load(dir: &Path) -> Result<Self> {
        let start = Instant::now();
        let sets = load_sets(&dir.join(SETS_FILE))?;

        let cards_dir = dir.join(CARDS_DIR);
        let mut files: Vec<PathBuf> = fs::read_dir(&cards_dir)
            .with_context(|| format!("Failed to read dataset directory {}", cards_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut dataset = Self::default();
        for path in &files {
            let Some(set_id) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let cards: Vec<ApiCard> = match serde_json::from_str(&contents) {
                Ok(cards) => cards,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unparseable dataset file");
                    continue;
                }
            };

            let (set_name, release_date) = match sets.get(&set_id) {
                Some(set) => (set.name.as_str(), set.release_date.as_deref()),
                None => (set_id.as_str(), None),
            };
            dataset.add_set(&set_id, set_name, release_date, cards);
        }
        dataset.sort_newest_first();

        info!(
            files = files.len(),
            cards = dataset.card_count,
            keys = dataset.by_key.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Bulk dataset indexed"
        );
        Ok(dataset)
    }

    fn add_set(
        &mut self,
        set_id: &str,
        set_name: &str,
        release_date: Option<&str>,
        cards: Vec<ApiCard>,
    ) {
        for card in cards {
            if !card.is_pokemon() || card.national_pokedex_numbers.is_empty() {
                continue;
            }
            let numbers = card.national_pokedex_numbers.clone();
            let Some(candidate) = card.into_candidate_with_set(set_id, set_name, release_date)
            else {
                continue;
            };
            for number in numbers {
                self.by_key.entry(number).or_default().push(candidate.clone());
            }
            self.card_count += 1;
        }
    }

    /// Newest release first; stable, so dataset order breaks ties.
    fn sort_newest_first(&mut self) {
        for candidates in self.by_key.values_mut() {
            candidates.sort_by_key(|c| Reverse(c.release_date.clone()));
        }
    }

    pub fn candidates(&self, key: CacheKey) -> &[CardCandidate] {
        self.by_key.get(&key.get()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn card_count(&self) -> usize {
        self.card_count
    }

    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }
}

fn load_sets(path: &Path) -> Result<HashMap<String, SetRecord>> {
    if !path.exists() {
        debug!(path = %path.display(), "No set index in dataset, using set ids as names");
        return Ok(HashMap::new());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let sets: Vec<SetRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(sets.into_iter().map(|s| (s.id.clone(), s)).collect())
}

/// Make sure the dataset clone exists under `dir` (cloning `repo` when it
/// does not), then index it. Calling this again only re-reads the clone.
///
/// The clone lands in a sibling `<dir>.partial` directory and is moved into
/// place only once git succeeds, so an interrupted clone never blocks the
/// next attempt.
pub async fn ensure_dataset_ready(dir: &Path, repo: &str) -> Result<BulkDataset> {
    if !dir.join(CARDS_DIR).is_dir() {
        clone_dataset(dir, repo).await?;
    } else {
        debug!(dir = %dir.display(), "Bulk dataset already present");
    }

    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || BulkDataset::load(&dir))
        .await
        .context("Dataset indexing task panicked")?
}

async fn clone_dataset(dir: &Path, repo: &str) -> Result<()> {
    let name = dir
        .file_name()
        .with_context(|| format!("Dataset directory {} has no name", dir.display()))?;
    let staging = dir.with_file_name(format!("{}.partial", name.to_string_lossy()));

    info!(repo, dir = %dir.display(), "Cloning bulk dataset");
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    remove_dir_if_exists(&staging)?;

    let status = tokio::process::Command::new("git")
        .args(["clone", "--depth", "1", repo])
        .arg(&staging)
        .status()
        .await
        .context("Failed to run git; is it installed?")?;
    if !status.success() {
        let _ = fs::remove_dir_all(&staging);
        bail!("git clone of {} failed with {}", repo, status);
    }

    if dir.exists() {
        warn!(dir = %dir.display(), "Replacing incomplete dataset directory");
        remove_dir_if_exists(dir)?;
    }
    fs::rename(&staging, dir)
        .with_context(|| format!("Failed to move dataset clone into {}", dir.display()))?;
    Ok(())
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// `CardSource` over a shared, already-loaded dataset.
#[derive(Clone)]
pub struct BulkSource {
    dataset: Arc<BulkDataset>,
}

impl BulkSource {
    pub fn new(dataset: Arc<BulkDataset>) -> Self {
        Self { dataset }
    }
}

#[async_trait]
impl CardSource for BulkSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Bulk
    }

    async fn fetch_candidates(
        &self,
        key: CacheKey,
        _limit: usize,
    ) -> Result<Vec<CardCandidate>, ApiError> {
        Ok(self.dataset.candidates(key).to_vec())
    }
}
