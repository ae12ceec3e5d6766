//! Read-through, write-through cache over a [`Store`].
//!
//! The cache mirrors the store for one preference set. All access goes
//! through one fair reader-writer lock:
//!
//! - typed reads and `contains_key` take shared access
//! - a read miss upgrades to exclusive access only to record what the store
//!   returned, so the store read and the cache fill are atomic with respect
//!   to writers
//! - writes, `delete`, `clear_all` and `cache_all` take exclusive access and
//!   hold it across the durable store call
//!
//! The cache is only touched after the store confirmed a write, so a failed
//! write never leaves the cache ahead of the store.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use prefcache_core::{
    is_reserved_key, PrefError, PrefResult, PrefType, PrefValue, StorageError, TextSet,
    VERSION_KEY,
};
use prefcache_storage::Store;

/// What the cache knows about one key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// Mirrors a value held by the store.
    Present(PrefValue),
    /// The store had no value when this key was last read.
    Absent,
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that went to the store.
    pub misses: u64,
    /// Calls made to the store to answer reads, including bulk reloads.
    pub store_reads: u64,
    /// Keys currently mirrored with a stored value.
    pub entry_count: u64,
    /// Store writes that reported failure.
    pub write_failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    store_reads: AtomicU64,
    write_failures: AtomicU64,
}

/// Cache-first typed access to one preference set.
pub struct CacheCoherentStore<S: Store> {
    store: S,
    cache: RwLock<HashMap<String, CacheEntry>>,
    counters: Counters,
    set: String,
}

fn check_key(key: &str) -> PrefResult<()> {
    if is_reserved_key(key) {
        return Err(PrefError::ReservedKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn extract<T: PrefType>(key: &str, entry: &CacheEntry) -> PrefResult<Option<T>> {
    match entry {
        CacheEntry::Absent => Ok(None),
        CacheEntry::Present(value) => {
            T::from_value(value)
                .map(Some)
                .ok_or_else(|| PrefError::TypeMismatch {
                    key: key.to_string(),
                    expected: T::KIND,
                    found: value.kind(),
                })
        }
    }
}

impl<S: Store> CacheCoherentStore<S> {
    /// Wrap `store` with an empty cache. `set` names the preference set in logs.
    ///
    /// Call [`cache_all`](Self::cache_all) to mirror the store up front.
    pub fn new(store: S, set: impl Into<String>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            counters: Counters::default(),
            set: set.into(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Read `key` as `T`, returning `None` if the store has no value.
    pub fn get_opt<T: PrefType>(&self, key: &str) -> PrefResult<Option<T>> {
        check_key(key)?;

        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(key) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return extract(key, entry);
            }
        }

        let cache = self.cache.upgradable_read();
        // Another miss may have filled the entry while we waited.
        if let Some(entry) = cache.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return extract(key, entry);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.store_reads.fetch_add(1, Ordering::Relaxed);
        let entry = match self.store.get_value(key)? {
            Some(value) => CacheEntry::Present(value),
            None => CacheEntry::Absent,
        };
        tracing::debug!(
            set = %self.set,
            key,
            present = matches!(entry, CacheEntry::Present(_)),
            "cache miss"
        );

        let result = extract(key, &entry);
        let mut cache = RwLockUpgradableReadGuard::upgrade(cache);
        cache.insert(key.to_string(), entry);
        result
    }

    /// Read `key` as `T`, falling back to `default`.
    pub fn get<T: PrefType>(&self, key: &str, default: T) -> PrefResult<T> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> PrefResult<bool> {
        self.get(key, default)
    }

    pub fn get_int(&self, key: &str, default: i32) -> PrefResult<i32> {
        self.get(key, default)
    }

    pub fn get_long(&self, key: &str, default: i64) -> PrefResult<i64> {
        self.get(key, default)
    }

    pub fn get_float(&self, key: &str, default: f32) -> PrefResult<f32> {
        self.get(key, default)
    }

    pub fn get_string(&self, key: &str, default: Option<&str>) -> PrefResult<Option<String>> {
        Ok(self
            .get_opt::<String>(key)?
            .or_else(|| default.map(str::to_string)))
    }

    pub fn get_string_set(
        &self,
        key: &str,
        default: Option<TextSet>,
    ) -> PrefResult<Option<TextSet>> {
        Ok(self.get_opt::<TextSet>(key)?.or(default))
    }

    /// Whether `key` has a stored value.
    ///
    /// A key the cache only knows as absent is checked against the store.
    pub fn contains_key(&self, key: &str) -> PrefResult<bool> {
        check_key(key)?;
        let cache = self.cache.read();
        match cache.get(key) {
            Some(CacheEntry::Present(_)) => Ok(true),
            _ => {
                self.counters.store_reads.fetch_add(1, Ordering::Relaxed);
                Ok(self.store.contains(key)?)
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Durably store `value` under `key`.
    ///
    /// Returns `Ok(false)` if the store rejected the write, in which case the
    /// cache keeps its previous entry for `key`.
    pub fn put<T: PrefType>(&self, key: &str, value: T) -> PrefResult<bool> {
        self.put_value(key, value.into_value())
    }

    /// Untyped form of [`put`](Self::put).
    pub fn put_value(&self, key: &str, value: PrefValue) -> PrefResult<bool> {
        check_key(key)?;
        let mut cache = self.cache.write();
        match self.store.put_value(key, value.clone()) {
            Ok(()) => {
                cache.insert(key.to_string(), CacheEntry::Present(value));
                Ok(true)
            }
            Err(e) => {
                self.record_write_failure("put", key, &e);
                Ok(false)
            }
        }
    }

    pub fn put_bool(&self, key: &str, value: bool) -> PrefResult<bool> {
        self.put(key, value)
    }

    pub fn put_int(&self, key: &str, value: i32) -> PrefResult<bool> {
        self.put(key, value)
    }

    pub fn put_long(&self, key: &str, value: i64) -> PrefResult<bool> {
        self.put(key, value)
    }

    pub fn put_float(&self, key: &str, value: f32) -> PrefResult<bool> {
        self.put(key, value)
    }

    /// Store `value`, or remove `key` when `value` is `None`.
    pub fn put_string(&self, key: &str, value: Option<&str>) -> PrefResult<bool> {
        match value {
            Some(text) => self.put(key, text.to_string()),
            None => self.delete(key),
        }
    }

    /// Store `value`, or remove `key` when `value` is `None`.
    pub fn put_string_set(&self, key: &str, value: Option<TextSet>) -> PrefResult<bool> {
        match value {
            Some(set) => self.put(key, set),
            None => self.delete(key),
        }
    }

    /// Durably remove `key`. The cache entry goes only if the store succeeded.
    pub fn delete(&self, key: &str) -> PrefResult<bool> {
        check_key(key)?;
        let mut cache = self.cache.write();
        match self.store.remove(key) {
            Ok(()) => {
                cache.remove(key);
                Ok(true)
            }
            Err(e) => {
                self.record_write_failure("delete", key, &e);
                Ok(false)
            }
        }
    }

    /// Durably remove every entry, including the version tag.
    pub fn clear_all(&self) -> bool {
        let mut cache = self.cache.write();
        match self.store.clear() {
            Ok(()) => {
                cache.clear();
                true
            }
            Err(e) => {
                self.record_write_failure("clear", "*", &e);
                false
            }
        }
    }

    /// Discard the cache and reload it from the store in one bulk read.
    ///
    /// If the bulk read fails the cache is left empty and later reads fall
    /// through to the store.
    pub fn cache_all(&self) -> PrefResult<()> {
        let mut cache = self.cache.write();
        cache.clear();
        self.counters.store_reads.fetch_add(1, Ordering::Relaxed);
        let entries = self.store.get_all()?;
        cache.extend(
            entries
                .into_iter()
                .filter(|(key, _)| key != VERSION_KEY)
                .map(|(key, value)| (key, CacheEntry::Present(value))),
        );
        tracing::debug!(set = %self.set, entries = cache.len(), "cache reloaded");
        Ok(())
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Keys mirrored with a stored value, sorted.
    pub fn keys(&self) -> Vec<String> {
        let cache = self.cache.read();
        let mut keys: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| matches!(entry, CacheEntry::Present(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of keys mirrored with a stored value.
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .values()
            .filter(|entry| matches!(entry, CacheEntry::Present(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// What the cache currently holds for `key`, without touching the store.
    pub fn cached(&self, key: &str) -> Option<CacheEntry> {
        self.cache.read().get(key).cloned()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            store_reads: self.counters.store_reads.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    fn record_write_failure(&self, op: &str, key: &str, error: &StorageError) {
        self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            set = %self.set,
            op,
            key,
            error = %error,
            "store write failed, cache unchanged"
        );
    }
}

impl<S: Store + fmt::Debug> fmt::Debug for CacheCoherentStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCoherentStore")
            .field("set", &self.set)
            .field("store", &self.store)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefcache_core::PrefKind;
    use prefcache_storage::MemoryStore;
    use prefcache_test_utils::{assertions, fixtures, CountingStore, FaultyStore};

    fn loaded<S: Store>(store: S) -> CacheCoherentStore<S> {
        let cache = CacheCoherentStore::new(store, "test");
        cache.cache_all().expect("reload should succeed");
        cache
    }

    #[test]
    fn test_cache_all_mirrors_every_kind() {
        let cache = loaded(CountingStore::new(fixtures::every_kind_store()));
        cache.store().reset();

        assert!(cache.get_bool("flag", false).unwrap());
        assert_eq!(cache.get_int("count", 0).unwrap(), -3);
        assert_eq!(cache.get_long("installed_at", 0).unwrap(), 1_700_000_000_000);
        assert_eq!(cache.get_float("scale", 0.0).unwrap(), 1.5);
        assert_eq!(cache.get_string("name", None).unwrap().as_deref(), Some("grace"));
        assert_eq!(
            cache.get_string_set("tags", None).unwrap(),
            Some(fixtures::text_set(&["beta", "pro"]))
        );

        assert_eq!(cache.store().counts().reads(), 0);
        assert_eq!(cache.stats().hits, 6);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_cache_all_skips_version_tag() {
        let cache = loaded(fixtures::legacy_store(3));
        assert_eq!(cache.keys(), vec!["dark_mode", "launch_count", "user_name"]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.cached(VERSION_KEY), None);
    }

    #[test]
    fn test_miss_reads_store_once() {
        let cache = loaded(CountingStore::new(MemoryStore::new()));
        cache.store().reset();

        assert_eq!(cache.get_int("volume", 5).unwrap(), 5);
        assert_eq!(cache.get_int("volume", 5).unwrap(), 5);
        assert_eq!(cache.store().counts().get, 1);
        assert_eq!(cache.cached("volume"), Some(CacheEntry::Absent));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        // One bulk reload plus one miss
        assert_eq!(stats.store_reads, 2);
        assert_eq!(stats.entry_count, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_absent_entry_returns_callers_default() {
        let cache = loaded(MemoryStore::new());
        assert_eq!(cache.get_int("volume", 5).unwrap(), 5);
        assert_eq!(cache.get_int("volume", 8).unwrap(), 8);
        assert_eq!(cache.get_string("name", None).unwrap(), None);
        assert_eq!(
            cache.get_string("name", Some("anon")).unwrap().as_deref(),
            Some("anon")
        );
        assert!(!cache.contains_key("volume").unwrap());
    }

    #[test]
    fn test_miss_picks_up_store_value() {
        let store = MemoryStore::new();
        let cache = loaded(store.clone());
        // Written behind the cache's back after the reload
        store.put_long("ts", 42).unwrap();

        assert_eq!(cache.get_long("ts", 0).unwrap(), 42);
        assert_eq!(cache.cached("ts"), Some(CacheEntry::Present(PrefValue::Long(42))));
    }

    #[test]
    fn test_put_then_get_without_store_read() {
        let cache = loaded(CountingStore::new(MemoryStore::new()));
        cache.store().reset();

        assert!(cache.put_int("k", 5).unwrap());
        assert_eq!(cache.get_int("k", 0).unwrap(), 5);
        assert_eq!(cache.store().counts().get, 0);
        assert_eq!(cache.store().counts().put, 1);
        assert!(cache.contains_key("k").unwrap());
    }

    #[test]
    fn test_put_replaces_absent_entry() {
        let cache = loaded(MemoryStore::new());
        assert_eq!(cache.get_string("name", None).unwrap(), None);
        assert!(cache.put_string("name", Some("ada")).unwrap());
        assert_eq!(cache.get_string("name", None).unwrap().as_deref(), Some("ada"));
    }

    #[test]
    fn test_failed_put_leaves_cache_untouched() {
        let cache = loaded(FaultyStore::new(MemoryStore::new()));
        assert!(cache.put_int("k", 1).unwrap());

        cache.store().fail_writes(true);
        assert!(!cache.put_int("k", 2).unwrap());
        assert!(!cache.put_int("fresh", 2).unwrap());

        assert_eq!(cache.get_int("k", 0).unwrap(), 1);
        assert_eq!(cache.cached("fresh"), None);
        assert_eq!(cache.store().inner().get_int("k", 0).unwrap(), 1);
        assert_eq!(cache.stats().write_failures, 2);
    }

    #[test]
    fn test_delete_removes_both_layers() {
        let cache = loaded(MemoryStore::new());
        cache.put_bool("flag", true).unwrap();

        assert!(cache.delete("flag").unwrap());
        assert!(!cache.contains_key("flag").unwrap());
        assert!(!cache.get_bool("flag", false).unwrap());
        assert!(!cache.store().contains("flag").unwrap());
    }

    #[test]
    fn test_put_none_removes_text_keys() {
        let cache = loaded(fixtures::every_kind_store());

        assert!(cache.put_string("name", None).unwrap());
        assert!(cache.put_string_set("tags", None).unwrap());
        assert!(!cache.contains_key("name").unwrap());
        assert!(!cache.store().contains("tags").unwrap());
        assert_eq!(cache.get_string("name", Some("anon")).unwrap().as_deref(), Some("anon"));
        assert_eq!(cache.get_string_set("tags", None).unwrap(), None);

        assert!(cache.put_string_set("tags", Some(fixtures::text_set(&["x"]))).unwrap());
        assert_eq!(
            cache.get_string_set("tags", None).unwrap(),
            Some(fixtures::text_set(&["x"]))
        );
        assertions::assert_reserved_key(&cache.put_string(VERSION_KEY, None));
    }

    #[test]
    fn test_failed_delete_keeps_entry() {
        let cache = loaded(FaultyStore::new(MemoryStore::new()));
        cache.put_long("ts", 9).unwrap();

        cache.store().fail_writes(true);
        assert!(!cache.delete("ts").unwrap());
        assert_eq!(cache.get_long("ts", 0).unwrap(), 9);
        assert!(cache.contains_key("ts").unwrap());
    }

    #[test]
    fn test_clear_all_empties_both_layers() {
        let cache = loaded(fixtures::legacy_store(2));
        cache.put_float("scale", 2.0).unwrap();

        assert!(cache.clear_all());
        assert!(cache.keys().is_empty());
        assert!(!cache.contains_key("scale").unwrap());
        assert!(!cache.contains_key("user_name").unwrap());
        assert!(cache.store().get_all().unwrap().is_empty());
    }

    #[test]
    fn test_failed_clear_keeps_cache() {
        let cache = loaded(FaultyStore::new(fixtures::legacy_store(2)));
        cache.store().fail_writes(true);

        assert!(!cache.clear_all());
        assert_eq!(cache.keys().len(), 3);
        assert_eq!(cache.get_int("launch_count", 0).unwrap(), 12);
    }

    #[test]
    fn test_reserved_key_rejected() {
        let cache = loaded(fixtures::legacy_store(2));
        assertions::assert_reserved_key(&cache.get_int(VERSION_KEY, 0));
        assertions::assert_reserved_key(&cache.put_int(VERSION_KEY, 9));
        assertions::assert_reserved_key(&cache.delete(VERSION_KEY));
        assertions::assert_reserved_key(&cache.contains_key(VERSION_KEY));
        assertions::assert_version_tag(cache.store(), 2);
    }

    #[test]
    fn test_type_mismatch_is_typed_error() {
        let cache = loaded(fixtures::legacy_store(2));
        assertions::assert_type_mismatch(
            &cache.get_int("user_name", 0),
            PrefKind::Int,
            PrefKind::Text,
        );
        // The entry itself is intact
        assert_eq!(cache.get_string("user_name", None).unwrap().as_deref(), Some("ada"));
    }

    #[test]
    fn test_type_mismatch_on_miss_still_caches() {
        let store = MemoryStore::new();
        let cache = loaded(store.clone());
        store.put_bool("flag", true).unwrap();

        assertions::assert_type_mismatch(
            &cache.get_long("flag", 0),
            PrefKind::Long,
            PrefKind::Bool,
        );
        assert_eq!(cache.cached("flag"), Some(CacheEntry::Present(PrefValue::Bool(true))));
    }

    #[test]
    fn test_store_read_failure_propagates() {
        let cache = loaded(FaultyStore::new(MemoryStore::new()));
        cache.store().fail_reads(true);

        let result = cache.get_int("k", 0);
        assert!(matches!(
            result,
            Err(PrefError::Storage(StorageError::Backend { .. }))
        ));
        assert_eq!(cache.cached("k"), None);
    }

    #[test]
    fn test_cache_all_failure_leaves_cache_empty() {
        let cache = loaded(FaultyStore::new(fixtures::legacy_store(2)));
        assert_eq!(cache.keys().len(), 3);

        cache.store().fail_reads(true);
        assertions::assert_storage_error(&cache.cache_all());
        assert!(cache.keys().is_empty());

        cache.store().fail_reads(false);
        assert_eq!(cache.get_int("launch_count", 0).unwrap(), 12);
    }

    #[test]
    fn test_cache_all_drops_negative_entries() {
        let store = MemoryStore::new();
        let cache = loaded(store.clone());
        assert_eq!(cache.get_int("k", 0).unwrap(), 0);

        store.put_int("k", 3).unwrap();
        assert_eq!(cache.get_int("k", 0).unwrap(), 0);

        cache.cache_all().unwrap();
        assert_eq!(cache.get_int("k", 0).unwrap(), 3);
    }

    #[test]
    fn test_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
