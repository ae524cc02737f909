use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{CacheKey, CachedCard, CardCandidate, GlobalMetadata, PerKeyMetadata};

/// Per-key and global metadata file name
pub const METADATA_FILE: &str = "metadata.json";

/// Sentinel file for keys that were attempted and yielded nothing
pub const EMPTY_MARKER_FILE: &str = ".empty";

const IMAGE_EXTENSION: &str = "png";

const STAGING_PREFIX: &str = ".incoming-";

/// Raw filesystem facts about one key directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStatus {
    pub exists: bool,
    pub file_count: usize,
    pub has_metadata: bool,
    pub has_empty_marker: bool,
}

/// Classification of a key, derived only from [`KeyStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Complete,
    Empty,
    Incomplete,
    Missing,
}

impl KeyStatus {
    pub fn is_complete(&self) -> bool {
        self.has_metadata && self.file_count > 0
    }

    /// Priority order: complete, empty-marked, present-but-partial, absent.
    pub fn state(&self) -> KeyState {
        if self.is_complete() {
            KeyState::Complete
        } else if self.has_empty_marker {
            KeyState::Empty
        } else if self.exists {
            KeyState::Incomplete
        } else {
            KeyState::Missing
        }
    }
}

/// A downloaded image waiting to be filed under a key.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub card: CardCandidate,
}

/// On-disk cache: `<root>/<key:04>/{01.png, 02.png, ..., metadata.json, .empty}`
/// plus `<root>/metadata.json`.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

fn is_image_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            ext == IMAGE_EXTENSION && !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn image_filename(ordinal: usize) -> String {
    format!("{:02}.{}", ordinal, IMAGE_EXTENSION)
}

/// Temporary name for the `index`-th incoming blob. Never matches
/// [`is_image_file`].
fn staging_filename(index: usize) -> String {
    format!("{}{:02}", STAGING_PREFIX, index + 1)
}

/// Write to a sibling temp file and rename over the target, so readers never
/// observe a half-written file.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write temp file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

impl CacheStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache root: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_dir(&self, key: CacheKey) -> PathBuf {
        self.root.join(key.dir_name())
    }

    fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let parsed = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(parsed))
    }

    fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)?;
        write_atomic(path, contents.as_bytes())
    }

    // ===== Key inspection =====

    /// Inspect a key directory. A missing directory is a normal result.
    pub fn key_status(&self, key: CacheKey) -> Result<KeyStatus> {
        let dir = self.key_dir(key);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(KeyStatus::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read cache directory {}", dir.display()))
            }
        };

        let mut status = KeyStatus {
            exists: true,
            ..KeyStatus::default()
        };
        for entry in entries {
            let entry =
                entry.with_context(|| format!("Failed to list cache directory {}", dir.display()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == METADATA_FILE {
                status.has_metadata = true;
            } else if name == EMPTY_MARKER_FILE {
                status.has_empty_marker = true;
            } else if is_image_file(&name) {
                status.file_count += 1;
            }
        }
        Ok(status)
    }

    /// Ordinal image files present for a key, sorted by name.
    pub fn image_files(&self, key: CacheKey) -> Result<Vec<PathBuf>> {
        let dir = self.key_dir(key);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if is_image_file(&entry.file_name().to_string_lossy()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load_key_metadata(&self, key: CacheKey) -> Result<Option<PerKeyMetadata>> {
        Self::load_json(&self.key_dir(key).join(METADATA_FILE))
    }

    pub fn read_empty_marker(&self, key: CacheKey) -> Result<Option<String>> {
        let path = self.key_dir(key).join(EMPTY_MARKER_FILE);
        match fs::read_to_string(&path) {
            Ok(reason) => Ok(Some(reason)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Numeric key directories present under the root, sorted.
    pub fn list_keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read cache root {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(key) = CacheKey::from_dir_name(&entry.file_name().to_string_lossy()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Total bytes of the image files stored for a key.
    pub fn key_disk_usage(&self, key: CacheKey) -> Result<u64> {
        let mut total = 0;
        for path in self.image_files(key)? {
            total += fs::metadata(&path)
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len();
        }
        Ok(total)
    }

    // ===== Writes =====

    /// Replace a key's cached images with `images`, numbered `01`, `02`, ...
    /// in arrival order, then record the metadata.
    ///
    /// Blobs are staged under temporary names first. A blob that cannot be
    /// written is skipped and does not consume an ordinal. When nothing
    /// could be staged the previous images and metadata are left as they
    /// were. Otherwise metadata is removed before the swap, so an
    /// interrupted write reads back as incomplete.
    pub fn write_cards(&self, key: CacheKey, images: Vec<ImageBlob>) -> Result<Vec<CachedCard>> {
        let dir = self.key_dir(key);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut staged = Vec::with_capacity(images.len());
        for (index, blob) in images.into_iter().enumerate() {
            let path = dir.join(staging_filename(index));
            if let Err(e) = fs::write(&path, &blob.bytes) {
                warn!(key = %key, card = %blob.card.id, error = %e, "Failed to write image, skipping");
                let _ = fs::remove_file(&path);
                continue;
            }
            staged.push((path, blob));
        }

        if staged.is_empty() {
            return Ok(Vec::new());
        }

        remove_file_if_exists(&dir.join(METADATA_FILE))?;
        for stale in self.image_files(key)? {
            remove_file_if_exists(&stale)?;
        }

        let mut cards = Vec::with_capacity(staged.len());
        for (staging, blob) in staged {
            let filename = image_filename(cards.len() + 1);
            fs::rename(&staging, dir.join(&filename))
                .with_context(|| format!("Failed to move {} into place", staging.display()))?;
            debug!(key = %key, file = %filename, bytes = blob.bytes.len(), "Image written");
            cards.push(CachedCard::from_candidate(filename, &blob.card));
        }

        let metadata = PerKeyMetadata::new(key, cards);
        Self::save_json(&dir.join(METADATA_FILE), &metadata)?;
        remove_file_if_exists(&dir.join(EMPTY_MARKER_FILE))?;
        Ok(metadata.cards)
    }

    /// Record that a key yielded nothing. Existing images and metadata are
    /// left untouched.
    pub fn write_empty_marker(&self, key: CacheKey, reason: &str) -> Result<()> {
        let dir = self.key_dir(key);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(EMPTY_MARKER_FILE);
        fs::write(&path, reason)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    // ===== Cleanup =====

    /// Delete a key directory. Returns whether anything was removed.
    pub fn remove_key(&self, key: CacheKey) -> Result<bool> {
        let dir = self.key_dir(key);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
        }
    }

    /// Delete a key directory that holds no images, or that carries the
    /// empty marker without metadata.
    pub fn remove_if_empty_or_marked(&self, key: CacheKey) -> Result<bool> {
        let status = self.key_status(key)?;
        if !status.exists {
            return Ok(false);
        }
        let marked_without_metadata = status.has_empty_marker && !status.has_metadata;
        if status.file_count == 0 || marked_without_metadata {
            return self.remove_key(key);
        }
        Ok(false)
    }

    // ===== Global metadata =====

    /// Load the global record. A file that no longer parses is reported
    /// and treated as absent; the next save replaces it.
    pub fn load_global_metadata(&self) -> Result<GlobalMetadata> {
        let path = self.root.join(METADATA_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(GlobalMetadata::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        match serde_json::from_str(&contents) {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Global metadata unreadable, starting fresh");
                Ok(GlobalMetadata::default())
            }
        }
    }

    pub fn save_global_metadata(&self, metadata: &GlobalMetadata) -> Result<()> {
        Self::save_json(&self.root.join(METADATA_FILE), metadata)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(n: u32) -> CacheKey {
        CacheKey::new(n).unwrap()
    }

    fn candidate(id: &str, set: &str) -> CardCandidate {
        CardCandidate {
            id: id.to_string(),
            name: format!("Card {}", id),
            set_id: set.to_string(),
            set_name: format!("Set {}", set),
            rarity: None,
            image_url: format!("https://images.example/{}.png", id),
            release_date: None,
        }
    }

    fn blob(id: &str, set: &str) -> ImageBlob {
        ImageBlob {
            bytes: id.as_bytes().to_vec(),
            card: candidate(id, set),
        }
    }

    fn store() -> (TempDir, CacheStore) {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cards")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_missing_key_is_not_an_error() {
        let (_tmp, store) = store();
        let status = store.key_status(key(1)).unwrap();
        assert_eq!(status, KeyStatus::default());
        assert_eq!(status.state(), KeyState::Missing);
    }

    #[test]
    fn test_write_cards_assigns_ordinals() {
        let (_tmp, store) = store();
        let cards = store
            .write_cards(key(25), vec![blob("a-1", "a"), blob("b-1", "b")])
            .unwrap();

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].filename, "01.png");
        assert_eq!(cards[1].filename, "02.png");

        let dir = store.key_dir(key(25));
        assert!(dir.ends_with("0025"));
        assert_eq!(fs::read(dir.join("02.png")).unwrap(), b"b-1");

        let status = store.key_status(key(25)).unwrap();
        assert!(status.is_complete());
        assert_eq!(status.file_count, 2);
        assert_eq!(status.state(), KeyState::Complete);

        let meta = store.load_key_metadata(key(25)).unwrap().unwrap();
        assert_eq!(meta.pokedex_number, 25);
        assert_eq!(meta.cards, cards);
        assert!(!dir.join("metadata.json.tmp").exists());
    }

    #[test]
    fn test_write_cards_replaces_previous_state() {
        let (_tmp, store) = store();
        store
            .write_cards(key(3), vec![blob("a", "a"), blob("b", "b"), blob("c", "c")])
            .unwrap();
        store.write_empty_marker(key(3), "earlier failure").unwrap();

        store.write_cards(key(3), vec![blob("d", "d")]).unwrap();

        let status = store.key_status(key(3)).unwrap();
        assert_eq!(status.file_count, 1);
        assert!(!status.has_empty_marker);
        let meta = store.load_key_metadata(key(3)).unwrap().unwrap();
        assert_eq!(meta.cards[0].card_id, "d");
    }

    #[test]
    fn test_empty_marker_keeps_existing_images() {
        let (_tmp, store) = store();
        store
            .write_cards(key(9), vec![blob("a", "a"), blob("b", "b"), blob("c", "c")])
            .unwrap();

        store.write_empty_marker(key(9), "no candidates").unwrap();

        let status = store.key_status(key(9)).unwrap();
        assert_eq!(status.file_count, 3);
        assert!(status.has_metadata);
        assert!(status.has_empty_marker);
        assert_eq!(status.state(), KeyState::Complete);
        assert_eq!(
            store.read_empty_marker(key(9)).unwrap().as_deref(),
            Some("no candidates")
        );
    }

    #[test]
    fn test_bare_directory_is_incomplete() {
        let (_tmp, store) = store();
        let dir = store.key_dir(key(4));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("01.png"), b"partial").unwrap();
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let status = store.key_status(key(4)).unwrap();
        assert_eq!(status.file_count, 1);
        assert_eq!(status.state(), KeyState::Incomplete);
    }

    #[test]
    fn test_marker_only_is_empty() {
        let (_tmp, store) = store();
        store.write_empty_marker(key(2), "no candidates").unwrap();
        assert_eq!(store.key_status(key(2)).unwrap().state(), KeyState::Empty);
    }

    #[test]
    fn test_remove_if_empty_or_marked() {
        let (_tmp, store) = store();
        store.write_empty_marker(key(1), "no candidates").unwrap();
        store.write_cards(key(2), vec![blob("a", "a")]).unwrap();
        fs::create_dir_all(store.key_dir(key(3))).unwrap();

        assert!(store.remove_if_empty_or_marked(key(1)).unwrap());
        assert!(!store.remove_if_empty_or_marked(key(2)).unwrap());
        assert!(store.remove_if_empty_or_marked(key(3)).unwrap());
        assert!(!store.remove_if_empty_or_marked(key(4)).unwrap());

        assert_eq!(store.list_keys().unwrap(), vec![key(2)]);
    }

    #[test]
    fn test_remove_key() {
        let (_tmp, store) = store();
        store.write_cards(key(5), vec![blob("a", "a")]).unwrap();
        assert!(store.remove_key(key(5)).unwrap());
        assert!(!store.remove_key(key(5)).unwrap());
        assert!(!store.key_status(key(5)).unwrap().exists);
    }

    #[test]
    fn test_list_keys_ignores_other_entries() {
        let (_tmp, store) = store();
        store.write_empty_marker(key(12), "x").unwrap();
        store.write_empty_marker(key(3), "x").unwrap();
        fs::create_dir_all(store.root().join("tmp")).unwrap();
        store.save_global_metadata(&GlobalMetadata::default()).unwrap();

        assert_eq!(store.list_keys().unwrap(), vec![key(3), key(12)]);
    }

    #[test]
    fn test_global_metadata_round_trip() {
        let (_tmp, store) = store();
        let initial = store.load_global_metadata().unwrap();
        assert!(initial.last_update.is_none());

        let mut meta = initial;
        meta.touch();
        store.save_global_metadata(&meta).unwrap();

        assert_eq!(store.load_global_metadata().unwrap(), meta);
    }

    #[test]
    fn test_corrupt_global_metadata_reads_as_default() {
        let (_tmp, store) = store();
        fs::write(store.root().join(METADATA_FILE), "{trunc").unwrap();

        let meta = store.load_global_metadata().unwrap();
        assert!(meta.last_update.is_none());

        let mut meta = meta;
        meta.touch();
        store.save_global_metadata(&meta).unwrap();
        assert_eq!(store.load_global_metadata().unwrap(), meta);
    }

    #[test]
    fn test_unwritable_blob_is_skipped_and_ordinals_stay_dense() {
        let (_tmp, store) = store();
        let dir = store.key_dir(key(8));
        // A directory squatting on the second staging name makes that write fail.
        fs::create_dir_all(dir.join(staging_filename(1))).unwrap();

        let cards = store
            .write_cards(key(8), vec![blob("a", "a"), blob("b", "b"), blob("c", "c")])
            .unwrap();

        let names: Vec<_> = cards.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["01.png", "02.png"]);
        assert_eq!(cards[1].card_id, "c");
        assert_eq!(fs::read(dir.join("02.png")).unwrap(), b"c");
        assert_eq!(store.key_status(key(8)).unwrap().file_count, 2);
        assert!(!dir.join(staging_filename(0)).exists());
        assert!(!dir.join(staging_filename(2)).exists());
    }

    #[test]
    fn test_failed_rewrite_keeps_previous_cards() {
        let (_tmp, store) = store();
        store
            .write_cards(key(7), vec![blob("old-1", "a"), blob("old-2", "b")])
            .unwrap();
        let dir = store.key_dir(key(7));
        fs::create_dir_all(dir.join(staging_filename(0))).unwrap();

        let cards = store.write_cards(key(7), vec![blob("new", "z")]).unwrap();

        assert!(cards.is_empty());
        let status = store.key_status(key(7)).unwrap();
        assert_eq!(status.state(), KeyState::Complete);
        assert_eq!(status.file_count, 2);
        assert_eq!(fs::read(dir.join("01.png")).unwrap(), b"old-1");
        let meta = store.load_key_metadata(key(7)).unwrap().unwrap();
        assert_eq!(meta.cards[0].card_id, "old-1");
    }

    #[test]
    fn test_key_disk_usage() {
        let (_tmp, store) = store();
        store
            .write_cards(key(6), vec![blob("abc", "a"), blob("de", "b")])
            .unwrap();
        assert_eq!(store.key_disk_usage(key(6)).unwrap(), 5);
    }

    #[test]
    fn test_image_file_detection() {
        assert!(is_image_file("01.png"));
        assert!(is_image_file("10.png"));
        assert!(!is_image_file("cover.png"));
        assert!(!is_image_file(".png"));
        assert!(!is_image_file("01.jpg"));
        assert!(!is_image_file("metadata.json"));
        assert!(!is_image_file(&staging_filename(0)));
    }
}
