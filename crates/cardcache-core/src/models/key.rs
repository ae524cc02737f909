use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Highest national pokedex number the cache addresses by default.
pub const DEFAULT_MAX_KEY: u32 = 1025;

/// One cache entry address (a national pokedex number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(u32);

impl CacheKey {
    /// Create a key. Zero is not a valid key.
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Directory name for this key, zero-padded to four digits.
    pub fn dir_name(self) -> String {
        format!("{:04}", self.0)
    }

    /// Parse a directory name produced by [`CacheKey::dir_name`].
    pub fn from_dir_name(name: &str) -> Option<Self> {
        if name.len() != 4 || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse().ok().and_then(Self::new)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:04}", self.0)
    }
}

/// A closed interval of keys, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    start: CacheKey,
    end: CacheKey,
}

impl KeyRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        let start = CacheKey::new(start).context("range start must be at least 1")?;
        let end = CacheKey::new(end).context("range end must be at least 1")?;
        if start > end {
            bail!("range start {} is greater than end {}", start.get(), end.get());
        }
        Ok(Self { start, end })
    }

    /// The full range `1..=max_key`.
    pub fn all(max_key: u32) -> Result<Self> {
        Self::new(1, max_key)
    }

    pub fn start(&self) -> CacheKey {
        self.start
    }

    pub fn end(&self) -> CacheKey {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end.0 - self.start.0 + 1) as usize
    }

    /// Always false: a range holds at least one key by construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        key >= self.start && key <= self.end
    }

    /// Reject ranges that reach past the highest addressable key.
    pub fn check_bounds(&self, max_key: u32) -> Result<()> {
        if self.end.0 > max_key {
            bail!("range end {} exceeds the maximum key {}", self.end.0, max_key);
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = CacheKey> {
        (self.start.0..=self.end.0).map(CacheKey)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.0, self.end.0)
    }
}

impl FromStr for KeyRange {
    type Err = anyhow::Error;

    /// Accepts `N-M` or a single `N`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (start, end) = match s.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s, s),
        };
        let start: u32 = start
            .parse()
            .with_context(|| format!("invalid range start '{}'", start))?;
        let end: u32 = end
            .parse()
            .with_context(|| format!("invalid range end '{}'", end))?;
        Self::new(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_name_round_trip() {
        let key = CacheKey::new(25).unwrap();
        assert_eq!(key.dir_name(), "0025");
        assert_eq!(CacheKey::from_dir_name("0025"), Some(key));
        assert_eq!(CacheKey::from_dir_name("25"), None);
        assert_eq!(CacheKey::from_dir_name("0000"), None);
        assert_eq!(CacheKey::from_dir_name("abcd"), None);
    }

    #[test]
    fn test_zero_key_rejected() {
        assert!(CacheKey::new(0).is_none());
    }

    #[test]
    fn test_parse_range() {
        let range: KeyRange = "1-151".parse().unwrap();
        assert_eq!(range.start().get(), 1);
        assert_eq!(range.end().get(), 151);
        assert_eq!(range.len(), 151);

        let single: KeyRange = "25".parse().unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_parse_invalid_ranges() {
        assert!("10-1".parse::<KeyRange>().is_err());
        assert!("0-5".parse::<KeyRange>().is_err());
        assert!("a-b".parse::<KeyRange>().is_err());
        assert!("".parse::<KeyRange>().is_err());
    }

    #[test]
    fn test_bounds_check() {
        let range = KeyRange::new(1000, 1100).unwrap();
        assert!(range.check_bounds(DEFAULT_MAX_KEY).is_err());
        assert!(KeyRange::all(DEFAULT_MAX_KEY)
            .unwrap()
            .check_bounds(DEFAULT_MAX_KEY)
            .is_ok());
    }

    #[test]
    fn test_keys_iterates_closed_interval() {
        let keys: Vec<u32> = KeyRange::new(3, 6).unwrap().keys().map(CacheKey::get).collect();
        assert_eq!(keys, vec![3, 4, 5, 6]);
    }
}
