//! A named, versioned preference set.

use std::fmt;
use std::ops::Deref;

use prefcache_core::PrefResult;
use prefcache_storage::{Store, StoreFactory};

use crate::{CacheCoherentStore, PreferenceSchema, VersionGate, VersionOutcome};

/// Versioned preference set served from an in-memory cache.
///
/// Dereferences to [`CacheCoherentStore`] for typed reads and writes.
/// Share it between threads with an `Arc`.
pub struct PreferenceSet<S: Store, P: PreferenceSchema> {
    schema: P,
    outcome: VersionOutcome,
    cache: CacheCoherentStore<S>,
}

impl<S: Store, P: PreferenceSchema> PreferenceSet<S, P> {
    /// Open the store named by `schema` and prepare it for use.
    pub fn open<F>(factory: &F, schema: P) -> PrefResult<Self>
    where
        F: StoreFactory<Store = S>,
    {
        let store = factory.open(schema.name())?;
        Self::with_store(store, schema)
    }

    /// Prepare an already opened store: version gate, then full reload.
    ///
    /// # Errors
    ///
    /// Fails if the schema version is invalid, the migration fails, or the
    /// store cannot be read.
    pub fn with_store(store: S, schema: P) -> PrefResult<Self> {
        let outcome = VersionGate::run(&store, &schema)?;

        let cache = CacheCoherentStore::new(store, schema.name());
        cache.cache_all()?;

        tracing::info!(
            set = schema.name(),
            version = outcome.declared,
            previous = outcome.stored,
            migrated = outcome.migrated,
            entries = cache.len(),
            "preference set opened"
        );

        Ok(Self {
            schema,
            outcome,
            cache,
        })
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Declared schema version.
    pub fn version(&self) -> i32 {
        self.outcome.declared
    }

    /// What the version gate did when this set was opened.
    pub fn version_outcome(&self) -> VersionOutcome {
        self.outcome
    }

    pub fn schema(&self) -> &P {
        &self.schema
    }
}

impl<S: Store, P: PreferenceSchema> Deref for PreferenceSet<S, P> {
    type Target = CacheCoherentStore<S>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl<S: Store + fmt::Debug, P: PreferenceSchema> fmt::Debug for PreferenceSet<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceSet")
            .field("name", &self.name())
            .field("outcome", &self.outcome)
            .field("cache", &self.cache)
            .finish()
    }
}
