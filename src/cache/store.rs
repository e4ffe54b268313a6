use crate::{
    cache::{CacheEntry, CacheIndex, Clock, SystemClock},
    config::CacheConfig,
    error::{describe, CacheError},
};
use serde::Serialize;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// A directory of cached preview images plus the [`CacheIndex`] describing
/// them.
///
/// Nothing here ever fails loudly. Problems with the disk are logged and the
/// cache behaves as if the entry wasn't there.
#[derive(Debug)]
pub struct PreviewCache<C = SystemClock> {
    config: CacheConfig,
    index: CacheIndex,
    clock: C,
    persistent: bool,
}

impl PreviewCache<SystemClock> {
    /// Open the cache described by `config`, using the system clock.
    pub fn initialize(config: CacheConfig) -> Self {
        PreviewCache::with_clock(config, SystemClock)
    }
}

impl<C: Clock> PreviewCache<C> {
    /// Open the cache described by `config`.
    ///
    /// If the cache directory can't be created the cache falls back to an
    /// empty in-memory index for the rest of the session. A corrupt index
    /// file is replaced with an empty index. Expired entries are swept
    /// immediately after loading.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        let persistent = match fs::create_dir_all(&config.directory) {
            Ok(_) => true,
            Err(e) => {
                log::error!(
                    "Previews will only be cached in memory: {}",
                    describe(&CacheError::io(&config.directory, e))
                );
                false
            },
        };

        let index = if persistent {
            load_index(&config.index_path())
        } else {
            CacheIndex::new()
        };

        let mut cache = PreviewCache {
            config,
            index,
            clock,
            persistent,
        };
        cache.sweep_expired();

        log::debug!(
            "Loaded {} cache entries from \"{}\"",
            cache.index.len(),
            cache.config.directory.display()
        );

        cache
    }

    /// The directory payloads are written to.
    pub fn directory(&self) -> &Path { &self.config.directory }

    /// The config this cache was opened with.
    pub fn config(&self) -> &CacheConfig { &self.config }

    /// Is the cache backed by a usable directory?
    pub fn is_persistent(&self) -> bool { self.persistent }

    /// Iterate over every entry, regardless of validity.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.index.iter()
    }

    /// Find a valid entry for `source_key`.
    pub fn lookup(&self, source_key: &str) -> Option<&CacheEntry> {
        self.index.get(source_key).filter(|e| self.is_valid(e))
    }

    /// An entry is valid when it's marked valid, its payload is still on
    /// disk, and it's younger than the expiry window.
    pub fn is_valid(&self, entry: &CacheEntry) -> bool {
        entry.valid
            && !entry.is_expired(self.clock.now(), self.config.expiry_secs)
            && self.payload_path(entry).is_file()
    }

    /// Read the payload for `source_key`, if there is a valid entry for it.
    pub fn read(&self, source_key: &str) -> Option<Vec<u8>> {
        let entry = self.lookup(source_key)?;
        let path = self.payload_path(entry);

        match fs::read(&path) {
            Ok(bytes) => {
                log::debug!("Cache hit for \"{}\"", source_key);
                Some(bytes)
            },
            Err(e) => {
                log::warn!(
                    "Treating \"{}\" as a cache miss: {}",
                    source_key,
                    describe(&CacheError::io(path, e))
                );
                None
            },
        }
    }

    /// Write `payload` to disk and record it in the index.
    ///
    /// Returns `None` when the payload couldn't be written. Failing to save
    /// the index afterwards is only logged; the payload stays put and the
    /// next successful save catches the index up.
    pub fn put(
        &mut self,
        source_key: &str,
        payload: &[u8],
    ) -> Option<CacheEntry> {
        let now = self.clock.now();
        let entry = CacheEntry::new(source_key, payload.len() as u64, now);
        let path = self.payload_path(&entry);

        if let Err(e) = fs::write(&path, payload) {
            log::warn!(
                "Unable to cache \"{}\": {}",
                source_key,
                describe(&CacheError::io(path, e))
            );
            return None;
        }

        self.index.upsert(entry.clone());
        self.index.touch(now);
        self.save();

        Some(entry)
    }

    /// Forget about a single entry. The payload file is left alone.
    pub fn invalidate(&mut self, source_key: &str) -> bool {
        if self.index.remove(source_key).is_none() {
            return false;
        }

        self.index.touch(self.clock.now());
        self.save();
        true
    }

    /// Remove every entry older than the expiry window, returning how many
    /// were removed. Payload files are left alone.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        let expiry = self.config.expiry_secs;
        let removed = self.index.retain(|e| !e.is_expired(now, expiry));

        if removed > 0 {
            log::debug!("Swept {} expired cache entries", removed);
            self.index.touch(now);
            self.save();
        }

        removed
    }

    /// Delete the whole cache directory and start again with an empty index.
    ///
    /// This can't be undone.
    pub fn clear_all(&mut self) {
        let dir = &self.config.directory;

        match fs::remove_dir_all(dir) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => log::warn!(
                "Unable to clear the cache: {}",
                describe(&CacheError::io(dir, e))
            ),
        }

        self.persistent = match fs::create_dir_all(dir) {
            Ok(_) => true,
            Err(e) => {
                log::error!(
                    "Unable to recreate the cache: {}",
                    describe(&CacheError::io(dir, e))
                );
                false
            },
        };

        self.index = CacheIndex::new();
        self.index.touch(self.clock.now());
        self.save();
    }

    /// Summarise what's in the cache.
    pub fn statistics(&self) -> CacheStatistics {
        let mut stats = CacheStatistics {
            last_update: self.index.last_update(),
            ..CacheStatistics::default()
        };

        for entry in self.index.iter() {
            stats.total_entries += 1;
            stats.total_bytes += entry.size_bytes;

            if self.is_valid(entry) {
                stats.valid_entries += 1;
                stats.valid_bytes += entry.size_bytes;
            }
        }

        stats.expired_entries = stats.total_entries - stats.valid_entries;
        stats
    }

    fn payload_path(&self, entry: &CacheEntry) -> PathBuf {
        self.config.directory.join(&entry.cache_file_name)
    }

    fn save(&self) {
        if !self.persistent {
            return;
        }

        if let Err(e) = save_index(&self.config.index_path(), &self.index) {
            log::warn!("Unable to save the cache index: {}", describe(&e));
        }
    }
}

/// A summary of the [`PreviewCache`]'s contents.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheStatistics {
    /// Every entry in the index.
    pub total_entries: usize,
    /// Entries that would be served as cache hits.
    pub valid_entries: usize,
    /// Entries that would be treated as cache misses.
    pub expired_entries: usize,
    /// The combined size of every entry.
    #[serde(rename = "TotalSize")]
    pub total_bytes: u64,
    /// The combined size of the valid entries.
    #[serde(rename = "ValidSize")]
    pub valid_bytes: u64,
    /// When the index was last mutated.
    pub last_update: u64,
}

fn load_index(path: &Path) -> CacheIndex {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(e) if e.kind() == ErrorKind::NotFound => return CacheIndex::new(),
        Err(e) => {
            log::warn!(
                "Starting with an empty cache: {}",
                describe(&CacheError::io(path, e))
            );
            return CacheIndex::new();
        },
    };

    match CacheIndex::from_json(&src) {
        Ok(index) => index,
        Err(e) => {
            log::warn!(
                "Starting with an empty cache, \"{}\" is corrupt: {}",
                path.display(),
                describe(&CacheError::from(e))
            );
            CacheIndex::new()
        },
    }
}

fn save_index(path: &Path, index: &CacheIndex) -> Result<(), CacheError> {
    let json = index.to_json()?;
    fs::write(path, json).map_err(|e| CacheError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const START: u64 = 1_700_000_000;
    const DAY: u64 = 24 * 60 * 60;

    fn cache_in(dir: &Path) -> (PreviewCache<ManualClock>, ManualClock) {
        let _ = env_logger::builder().is_test(true).try_init();
        let clock = ManualClock::new(START);
        let cache =
            PreviewCache::with_clock(CacheConfig::new(dir), clock.clone());
        (cache, clock)
    }

    fn payload_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name().unwrap() != CacheConfig::DEFAULT_INDEX_FILE
            })
            .collect()
    }

    #[test]
    fn put_then_lookup_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, _) = cache_in(temp.path());
        let payload = b"not really a png";

        let written = cache.put("a.png", payload).unwrap();
        let found = cache.lookup("a.png").unwrap().clone();

        assert_eq!(found, written);
        assert_eq!(cache.read("a.png").unwrap(), payload.to_vec());
        assert_eq!(
            fs::read(temp.path().join(&found.cache_file_name)).unwrap(),
            payload.to_vec()
        );
    }

    #[test]
    fn lookup_returns_the_latest_put() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, clock) = cache_in(temp.path());

        cache.put("a.png", b"first").unwrap();
        clock.advance(Duration::from_secs(60));
        cache.put("a.png", b"second!").unwrap();

        let entry = cache.lookup("a.png").unwrap();
        assert_eq!(entry.size_bytes, 7);
        assert_eq!(entry.cached_at, START + 60);
        assert_eq!(cache.read("a.png").unwrap(), b"second!".to_vec());
        assert_eq!(cache.statistics().total_entries, 1);
    }

    #[test]
    fn unknown_keys_are_a_miss() {
        let temp = tempfile::tempdir().unwrap();
        let (cache, _) = cache_in(temp.path());

        assert!(cache.lookup("missing.png").is_none());
        assert!(cache.read("missing.png").is_none());
    }

    #[test]
    fn deleted_payloads_are_a_miss() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, _) = cache_in(temp.path());
        let entry = cache.put("a.png", b"payload").unwrap();

        fs::remove_file(temp.path().join(&entry.cache_file_name)).unwrap();

        assert!(cache.lookup("a.png").is_none());
        assert_eq!(cache.statistics().valid_entries, 0);
        assert_eq!(cache.statistics().total_entries, 1);
    }

    #[test]
    fn entries_marked_invalid_are_a_miss() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, _) = cache_in(temp.path());
        let mut entry = cache.put("a.png", b"payload").unwrap();

        entry.valid = false;

        assert!(!cache.is_valid(&entry));
    }

    #[test]
    fn index_survives_a_restart() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, _) = cache_in(temp.path());
        cache.put("a.png", b"payload").unwrap();
        drop(cache);

        let (reopened, _) = cache_in(temp.path());

        assert_eq!(reopened.read("a.png").unwrap(), b"payload".to_vec());
    }

    #[test]
    fn corrupt_index_starts_empty() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, _) = cache_in(temp.path());
        cache.put("a.png", b"payload").unwrap();
        drop(cache);
        let index_path = temp.path().join(CacheConfig::DEFAULT_INDEX_FILE);
        let truncated = fs::read_to_string(&index_path).unwrap();
        fs::write(&index_path, &truncated[..truncated.len() / 2]).unwrap();

        let (reopened, _) = cache_in(temp.path());

        assert_eq!(reopened.statistics().total_entries, 0);
        assert!(reopened.is_persistent());
    }

    #[test]
    fn sweep_boundary() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, clock) = cache_in(temp.path());
        let expiry = CacheConfig::DEFAULT_EXPIRY_SECS;
        cache.put("old.png", b"old").unwrap();
        clock.set(START + 1);
        cache.put("young.png", b"young").unwrap();

        clock.set(START + expiry);
        let removed = cache.sweep_expired();

        assert_eq!(removed, 1);
        assert!(cache.lookup("old.png").is_none());
        assert!(cache.lookup("young.png").is_some());
        // sweeping leaves payload files behind
        assert_eq!(payload_files(temp.path()).len(), 2);
    }

    #[test]
    fn expired_entries_scenario() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, clock) = cache_in(temp.path());

        cache.put("a.png", &[0_u8; 100]).unwrap();
        let stats = cache.statistics();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_bytes, 100);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.valid_bytes, 100);

        clock.advance(Duration::from_secs(8 * DAY));
        let stats = cache.statistics();
        assert_eq!(stats.valid_entries, 0);
        assert_eq!(stats.expired_entries, 1);

        cache.sweep_expired();
        assert_eq!(cache.statistics().total_entries, 0);
    }

    #[test]
    fn expired_entries_are_swept_on_load() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, clock) = cache_in(temp.path());
        cache.put("a.png", b"payload").unwrap();
        drop(cache);

        clock.advance(Duration::from_secs(8 * DAY));
        let reopened =
            PreviewCache::with_clock(CacheConfig::new(temp.path()), clock);

        assert_eq!(reopened.statistics().total_entries, 0);
    }

    #[test]
    fn clear_all_removes_everything() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("previews");
        let (mut cache, _) = cache_in(&dir);
        cache.put("a.png", b"a").unwrap();
        cache.put("b.png", b"b").unwrap();

        cache.clear_all();

        assert_eq!(cache.statistics().total_entries, 0);
        assert!(dir.is_dir());
        assert!(payload_files(&dir).is_empty());
    }

    #[test]
    fn invalidate_a_single_entry() {
        let temp = tempfile::tempdir().unwrap();
        let (mut cache, _) = cache_in(temp.path());
        cache.put("a.png", b"a").unwrap();
        cache.put("b.png", b"b").unwrap();

        assert!(cache.invalidate("a.png"));
        assert!(!cache.invalidate("a.png"));

        assert!(cache.lookup("a.png").is_none());
        assert!(cache.lookup("b.png").is_some());
    }

    #[test]
    fn unusable_directory_falls_back_to_memory() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("not-a-directory");
        fs::write(&blocker, "").unwrap();

        let (mut cache, _) = cache_in(&blocker.join("previews"));

        assert!(!cache.is_persistent());
        assert!(cache.put("a.png", b"a").is_none());
        assert_eq!(cache.statistics(), CacheStatistics::default());
    }

    #[test]
    fn statistics_use_the_documented_names() {
        let stats = CacheStatistics {
            total_entries: 2,
            valid_entries: 1,
            expired_entries: 1,
            total_bytes: 30,
            valid_bytes: 10,
            last_update: 42,
        };

        let got = serde_json::to_value(&stats).unwrap();

        assert_eq!(
            got,
            serde_json::json!({
                "TotalEntries": 2,
                "ValidEntries": 1,
                "ExpiredEntries": 1,
                "TotalSize": 30,
                "ValidSize": 10,
                "LastUpdate": 42,
            })
        );
    }
}
