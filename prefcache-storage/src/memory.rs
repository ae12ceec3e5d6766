//! In-memory store.
//!
//! Handles are cheap to clone and share the same entries, so a
//! [`MemoryStoreFactory`] can hand the same data back when a set is reopened.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::{validate_store_name, PrefValue, StorageResult, Store, StoreFactory};

/// Process-local store backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, PrefValue>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PrefValue)>,
        K: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        Ok(self.entries.read().clone())
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Hands out one shared [`MemoryStore`] per name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreFactory {
    stores: Arc<Mutex<HashMap<String, MemoryStore>>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names opened so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl StoreFactory for MemoryStoreFactory {
    type Store = MemoryStore;

    fn open(&self, name: &str) -> StorageResult<MemoryStore> {
        validate_store_name(name)?;
        Ok(self
            .stores
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone())
    }
}
