//! prefcache Storage - Store Trait and Backends
//!
//! Defines the durable key-value boundary preference sets sit in front of.
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`]: process-local, used by tests and ephemeral sets
//! - [`LmdbStore`]: one LMDB named database per preference set
//!
//! Every mutating call is synchronous and durable once it returns `Ok`.

pub mod lmdb;
pub mod memory;

pub use lmdb::{LmdbStore, LmdbStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};

pub use prefcache_core::{PrefKind, PrefType, PrefValue, StorageError, StorageResult, TextSet};

use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Durable key-value medium backing one named preference set.
///
/// Implementations must be safe to call from several threads. Writes are
/// expected to be committed before returning `Ok`; an `Err` means the store
/// is unchanged for that key.
pub trait Store: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>>;

    /// Read every entry in one pass.
    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>>;

    /// Whether `key` has a stored value.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_value(key)?.is_some())
    }

    /// Durably store `value` under `key`, replacing any previous value.
    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()>;

    /// Durably remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Durably remove every entry.
    fn clear(&self) -> StorageResult<()>;

    // === Typed reads ===

    fn get_bool(&self, key: &str, default: bool) -> StorageResult<bool> {
        Ok(typed(key, self.get_value(key)?)?.unwrap_or(default))
    }

    fn get_int(&self, key: &str, default: i32) -> StorageResult<i32> {
        Ok(typed(key, self.get_value(key)?)?.unwrap_or(default))
    }

    fn get_long(&self, key: &str, default: i64) -> StorageResult<i64> {
        Ok(typed(key, self.get_value(key)?)?.unwrap_or(default))
    }

    fn get_float(&self, key: &str, default: f32) -> StorageResult<f32> {
        Ok(typed(key, self.get_value(key)?)?.unwrap_or(default))
    }

    fn get_string(&self, key: &str, default: Option<&str>) -> StorageResult<Option<String>> {
        Ok(typed(key, self.get_value(key)?)?.or_else(|| default.map(str::to_string)))
    }

    fn get_string_set(
        &self,
        key: &str,
        default: Option<TextSet>,
    ) -> StorageResult<Option<TextSet>> {
        Ok(typed(key, self.get_value(key)?)?.or(default))
    }

    // === Typed writes ===

    fn put_bool(&self, key: &str, value: bool) -> StorageResult<()> {
        self.put_value(key, PrefValue::Bool(value))
    }

    fn put_int(&self, key: &str, value: i32) -> StorageResult<()> {
        self.put_value(key, PrefValue::Int(value))
    }

    fn put_long(&self, key: &str, value: i64) -> StorageResult<()> {
        self.put_value(key, PrefValue::Long(value))
    }

    fn put_float(&self, key: &str, value: f32) -> StorageResult<()> {
        self.put_value(key, PrefValue::Float(value))
    }

    fn put_string(&self, key: &str, value: &str) -> StorageResult<()> {
        self.put_value(key, PrefValue::Text(value.to_string()))
    }

    fn put_string_set(&self, key: &str, value: TextSet) -> StorageResult<()> {
        self.put_value(key, PrefValue::TextSet(value))
    }
}

/// Extract `T` from a stored value, reporting a kind mismatch as an error.
pub fn typed<T: PrefType>(key: &str, value: Option<PrefValue>) -> StorageResult<Option<T>> {
    match value {
        None => Ok(None),
        Some(value) => T::from_value(&value)
            .map(Some)
            .ok_or_else(|| StorageError::TypeMismatch {
                key: key.to_string(),
                expected: T::KIND,
                found: value.kind(),
            }),
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        (**self).get_value(key)
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        (**self).get_all()
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        (**self).contains(key)
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        (**self).put_value(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        (**self).clear()
    }
}

// ============================================================================
// STORE FACTORY
// ============================================================================

/// Opens the store backing a named preference set.
pub trait StoreFactory {
    type Store: Store;

    /// Open (creating if needed) the store called `name`.
    fn open(&self, name: &str) -> StorageResult<Self::Store>;
}

/// Check that `name` can identify a store on every backend.
pub fn validate_store_name(name: &str) -> StorageResult<()> {
    let reason = if name.trim().is_empty() {
        Some("name must not be empty")
    } else if name.contains(['/', '\\']) {
        Some("name must not contain path separators")
    } else if name.contains('\0') {
        Some("name must not contain NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
