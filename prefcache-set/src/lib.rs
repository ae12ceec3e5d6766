//! prefcache Set - Versioned, Cached Preference Sets
//!
//! A [`PreferenceSet`] binds a consumer's [`PreferenceSchema`] to one named
//! [`Store`]. Opening a set:
//!
//! 1. opens the store through a [`StoreFactory`]
//! 2. runs the [`VersionGate`], migrating if the stored version differs
//! 3. loads every stored entry into the [`CacheCoherentStore`]
//!
//! After that, typed reads are served from memory and every write goes to
//! the store before the cache is updated.
//!
//! ```ignore
//! use prefcache_set::{PrefResult, PreferenceSchema, PreferenceSet};
//! use prefcache_storage::{MemoryStoreFactory, Store};
//!
//! struct Settings;
//!
//! impl PreferenceSchema for Settings {
//!     fn name(&self) -> &str { "settings" }
//!     fn version(&self) -> i32 { 2 }
//!     fn migrate(&self, store: &dyn Store, _old: i32, _new: i32) -> PrefResult<()> {
//!         store.remove("legacy_theme")?;
//!         Ok(())
//!     }
//! }
//!
//! let prefs = PreferenceSet::open(&MemoryStoreFactory::new(), Settings)?;
//! prefs.put_bool("dark_mode", true)?;
//! assert!(prefs.get_bool("dark_mode", false)?);
//! ```

pub mod coherent;
pub mod set;
pub mod version;

pub use coherent::{CacheCoherentStore, CacheEntry, CacheStats};
pub use set::PreferenceSet;
pub use version::{VersionGate, VersionOutcome};

pub use prefcache_core::{
    PrefError, PrefKind, PrefResult, PrefType, PrefValue, StorageError, TextSet, VERSION_KEY,
};
pub use prefcache_storage::{Store, StoreFactory};

/// Consumer-defined description of a preference set.
pub trait PreferenceSchema: Send + Sync {
    /// Name of the store backing this set.
    fn name(&self) -> &str;

    /// Current schema version, starting at 1.
    fn version(&self) -> i32;

    /// Bring `store` from version `old` to version `new`.
    ///
    /// Called at most once per open, before the version tag is rewritten and
    /// before the cache is loaded. The store is passed raw, so any key may be
    /// read or written.
    fn migrate(&self, store: &dyn Store, old: i32, new: i32) -> PrefResult<()>;
}

impl<P: PreferenceSchema + ?Sized> PreferenceSchema for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn version(&self) -> i32 {
        (**self).version()
    }

    fn migrate(&self, store: &dyn Store, old: i32, new: i32) -> PrefResult<()> {
        (**self).migrate(store, old, new)
    }
}
