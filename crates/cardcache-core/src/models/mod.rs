//! Data models for the card cache.
//!
//! - `CacheKey`, `KeyRange`: addressing of cache entries
//! - `ApiCard`, `CardsResponse`: upstream wire shapes
//! - `CardCandidate`: in-memory selection input
//! - `CachedCard`, `PerKeyMetadata`, `GlobalMetadata`: persisted records

pub mod card;
pub mod key;
pub mod metadata;

pub use card::{ApiCard, ApiSet, CachedCard, CardCandidate, CardImages, CardsResponse};
pub use key::{CacheKey, KeyRange, DEFAULT_MAX_KEY};
pub use metadata::{GlobalMetadata, PerKeyMetadata, CACHE_VERSION};
