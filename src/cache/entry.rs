use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// One row of the [`CacheIndex`], recording when a remote resource was
/// written to disk and under which name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The remote resource's name (e.g. `"3B3C3F_DAD9D5_929290_ABACA8.png"`).
    #[serde(rename = "fileName")]
    pub source_key: String,
    /// The payload's file name, relative to the cache directory.
    #[serde(rename = "cacheFileName")]
    pub cache_file_name: String,
    /// When the payload was written, in seconds since the Unix epoch.
    #[serde(rename = "cacheTime")]
    pub cached_at: u64,
    /// The payload's size.
    #[serde(rename = "fileSize")]
    pub size_bytes: u64,
    /// Can this entry be trusted?
    #[serde(rename = "isValid")]
    pub valid: bool,
}

impl CacheEntry {
    /// Create a fresh, valid [`CacheEntry`] for `source_key`.
    pub fn new(source_key: &str, size_bytes: u64, cached_at: u64) -> Self {
        CacheEntry {
            source_key: source_key.to_string(),
            cache_file_name: cache_file_name(source_key),
            cached_at,
            size_bytes,
            valid: true,
        }
    }

    /// How many seconds old is this entry, as of `now`?
    ///
    /// Entries from the future are treated as brand new.
    pub fn age(&self, now: u64) -> u64 { now.saturating_sub(self.cached_at) }

    /// Has this entry outlived the expiry window?
    pub fn is_expired(&self, now: u64, expiry_secs: u64) -> bool {
        self.age(now) >= expiry_secs
    }
}

/// The persisted table of everything in the cache directory.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndex {
    #[serde(default)]
    entries: Vec<CacheEntry>,
    #[serde(rename = "lastUpdate", default)]
    last_update: u64,
}

impl CacheIndex {
    /// Create a new, empty [`CacheIndex`].
    pub fn new() -> Self { CacheIndex::default() }

    /// Parse the index file's contents.
    ///
    /// If the file contains the same key more than once, the last row wins.
    pub fn from_json(src: &str) -> Result<Self, serde_json::Error> {
        let raw: CacheIndex = serde_json::from_str(src)?;
        let mut index = CacheIndex {
            entries: Vec::with_capacity(raw.entries.len()),
            last_update: raw.last_update,
        };

        for entry in raw.entries {
            index.upsert(entry);
        }

        Ok(index)
    }

    /// Serialize the index in the same format [`CacheIndex::from_json()`]
    /// reads.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Find the entry for a particular key, regardless of its validity.
    pub fn get(&self, source_key: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.source_key == source_key)
    }

    /// Insert an entry, replacing any existing entry with the same key.
    pub fn upsert(&mut self, entry: CacheEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.source_key == entry.source_key)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove the entry for a key, returning it if there was one.
    pub fn remove(&mut self, source_key: &str) -> Option<CacheEntry> {
        let position =
            self.entries.iter().position(|e| e.source_key == source_key)?;
        Some(self.entries.remove(position))
    }

    /// Only keep the entries matching a predicate, returning how many were
    /// removed.
    pub fn retain<F>(&mut self, predicate: F) -> usize
    where
        F: FnMut(&CacheEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(predicate);
        before - self.entries.len()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.entries.iter()
    }

    /// The number of entries.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// When the index was last mutated.
    pub fn last_update(&self) -> u64 { self.last_update }

    /// Record a mutation.
    pub fn touch(&mut self, now: u64) { self.last_update = now; }
}

/// Derive the on-disk name for a source key.
///
/// This is the first 128 bits of the key's SHA-256 digest, followed by the
/// key's (lowercased) extension.
///
/// ```rust
/// let name = matcap_cache::cache::cache_file_name("Gold.PNG");
/// assert!(name.ends_with(".png"));
/// assert_eq!(name.len(), 32 + ".png".len());
/// ```
pub fn cache_file_name(source_key: &str) -> String {
    let digest = Sha256::digest(source_key.as_bytes());
    let mut name = hex::encode(&digest[..16]);

    let extension = Path::new(source_key).extension().and_then(|e| e.to_str());

    if let Some(ext) = extension {
        name.push('.');
        name.push_str(&ext.to_ascii_lowercase());
    }

    name
}
