//! Local on-disk card image cache.
//!
//! This module provides the `CacheStore` for the on-disk layout and the
//! `CacheManager` that fills it one key at a time:
//!
//! ```text
//! <root>/<key:04>/01.png, 02.png, ...   ordinal images
//! <root>/<key:04>/metadata.json         per-key record (marks the key complete)
//! <root>/<key:04>/.empty                attempted, nothing cached (reason text)
//! <root>/metadata.json                  global record
//! ```

pub mod cleanup;
pub mod manager;
pub mod store;

pub use cleanup::{clean_empty, clean_incomplete};
pub use manager::{is_cancelled, CacheManager, ProcessOutcome, NO_CANDIDATES_REASON};
pub use store::{CacheStore, ImageBlob, KeyState, KeyStatus, EMPTY_MARKER_FILE, METADATA_FILE};
