//! LMDB-backed store implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a durable,
//! memory-mapped key-value store for preference sets.
//!
//! # Layout
//!
//! One environment holds every preference set. Each set lives in its own
//! LMDB named database, so clearing one set never touches another.
//! Values are stored as JSON-encoded [`PrefValue`]s.
//!
//! # Durability
//!
//! Every mutation runs in its own write transaction and is committed before
//! the call returns. Reads use short-lived read transactions.

use std::collections::HashMap;
use std::fmt;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use prefcache_core::StoreConfig;

use crate::{validate_store_name, PrefValue, StorageError, StorageResult, Store, StoreFactory};

fn backend(e: heed::Error) -> StorageError {
    StorageError::Backend {
        reason: e.to_string(),
    }
}

fn decode(key: &str, bytes: &[u8]) -> StorageResult<PrefValue> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode(key: &str, value: &PrefValue) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Opens preference sets as named databases inside one LMDB environment.
///
/// # Example
///
/// ```ignore
/// use prefcache_core::StoreConfig;
/// use prefcache_storage::{LmdbStoreFactory, StoreFactory};
///
/// let factory = LmdbStoreFactory::new(&StoreConfig::for_dir("/tmp/prefs"))?;
/// let store = factory.open("settings")?;
/// store.put_int("launch_count", 1)?;
/// ```
#[derive(Clone)]
pub struct LmdbStoreFactory {
    env: Env,
}

impl LmdbStoreFactory {
    /// Create or open the environment described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config is invalid
    /// - The directory cannot be created
    /// - The LMDB environment cannot be opened
    pub fn new(config: &StoreConfig) -> StorageResult<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.root_dir)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size_bytes())
                .max_dbs(config.max_sets)
                .open(&config.root_dir)
        }
        .map_err(backend)?;

        tracing::debug!(root = %config.root_dir.display(), "opened preference environment");
        Ok(Self { env })
    }
}

impl fmt::Debug for LmdbStoreFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStoreFactory")
            .field("path", &self.env.path())
            .finish()
    }
}

impl StoreFactory for LmdbStoreFactory {
    type Store = LmdbStore;

    fn open(&self, name: &str) -> StorageResult<LmdbStore> {
        validate_store_name(name)?;

        let mut wtxn = self.env.write_txn().map_err(backend)?;
        let db: Database<Str, Bytes> = self
            .env
            .create_database(&mut wtxn, Some(name))
            .map_err(backend)?;
        wtxn.commit().map_err(backend)?;

        Ok(LmdbStore {
            env: self.env.clone(),
            db,
            name: name.to_string(),
        })
    }
}

/// One preference set stored in an LMDB named database.
#[derive(Clone)]
pub struct LmdbStore {
    env: Env,
    db: Database<Str, Bytes>,
    name: String,
}

impl LmdbStore {
    /// Name of the database this store writes to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` in a write transaction and commit it.
    fn write<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut heed::RwTxn<'_>) -> heed::Result<()>,
    {
        let mut wtxn = self.env.write_txn().map_err(backend)?;
        f(&mut wtxn).map_err(backend)?;
        wtxn.commit().map_err(backend)
    }
}

impl fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStore").field("name", &self.name).finish()
    }
}

impl Store for LmdbStore {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        match self.db.get(&rtxn, key).map_err(backend)? {
            Some(bytes) => decode(key, bytes).map(Some),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        let mut entries = HashMap::new();
        for result in self.db.iter(&rtxn).map_err(backend)? {
            let (key, bytes) = result.map_err(backend)?;
            entries.insert(key.to_string(), decode(key, bytes)?);
        }
        Ok(entries)
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        Ok(self.db.get(&rtxn, key).map_err(backend)?.is_some())
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        let bytes = encode(key, &value)?;
        self.write(|wtxn| self.db.put(wtxn, key, bytes.as_slice()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.write(|wtxn| self.db.delete(wtxn, key).map(|_| ()))
    }

    fn clear(&self) -> StorageResult<()> {
        self.write(|wtxn| self.db.clear(wtxn))
    }
}
