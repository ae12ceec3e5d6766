//! Version gate run once when a preference set is opened.

use prefcache_core::{PrefError, PrefResult, DEFAULT_VERSION, VERSION_KEY};
use prefcache_storage::Store;

use crate::PreferenceSchema;

/// What the version gate observed and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionOutcome {
    /// Version found in the store, or 1 if none was recorded.
    pub stored: i32,
    /// Version the schema declares.
    pub declared: i32,
    /// Whether the schema's migration was invoked.
    pub migrated: bool,
    /// Whether the declared version was durably written back.
    pub tag_persisted: bool,
}

/// Reconciles the stored version tag with the declared schema version.
pub struct VersionGate;

impl VersionGate {
    /// Migrate `store` if its tag differs from `schema.version()`, then
    /// record the declared version.
    ///
    /// # Errors
    ///
    /// - [`PrefError::InvalidVersion`] if the schema declares a version below 1
    /// - [`PrefError::Storage`] if the tag cannot be read
    /// - [`PrefError::Migration`] if the migration fails, in which case the
    ///   tag is left as it was
    ///
    /// Failing to write the tag is not an error. It is logged and reported
    /// through [`VersionOutcome::tag_persisted`].
    pub fn run<S, P>(store: &S, schema: &P) -> PrefResult<VersionOutcome>
    where
        S: Store,
        P: PreferenceSchema + ?Sized,
    {
        let declared = schema.version();
        if declared < DEFAULT_VERSION {
            return Err(PrefError::InvalidVersion { version: declared });
        }

        let stored = store.get_int(VERSION_KEY, DEFAULT_VERSION)?;
        let migrated = stored != declared;
        if migrated {
            tracing::info!(
                set = schema.name(),
                from = stored,
                to = declared,
                "migrating preference set"
            );
            schema
                .migrate(store, stored, declared)
                .map_err(|e| match e {
                    PrefError::Migration { .. } => e,
                    other => PrefError::migration(stored, declared, other.to_string()),
                })?;
        }

        let tag_persisted = match store.put_int(VERSION_KEY, declared) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    set = schema.name(),
                    version = declared,
                    error = %e,
                    "failed to persist version tag"
                );
                false
            }
        };

        Ok(VersionOutcome {
            stored,
            declared,
            migrated,
            tag_persisted,
        })
    }
}
