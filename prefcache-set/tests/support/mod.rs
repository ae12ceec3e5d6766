//! Shared schemas for prefcache-set integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use prefcache_set::{PrefError, PrefResult, PreferenceSchema, Store};

type MigrationStep = Box<dyn Fn(&dyn Store, i32, i32) -> PrefResult<()> + Send + Sync>;

/// Schema that records every migration call.
pub struct RecordingSchema {
    name: String,
    version: i32,
    step: Option<MigrationStep>,
    calls: Mutex<Vec<(i32, i32)>>,
}

impl RecordingSchema {
    pub fn new(name: &str, version: i32) -> Self {
        Self {
            name: name.to_string(),
            version,
            step: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Run `step` as the migration body.
    pub fn with_step<F>(mut self, step: F) -> Self
    where
        F: Fn(&dyn Store, i32, i32) -> PrefResult<()> + Send + Sync + 'static,
    {
        self.step = Some(Box::new(step));
        self
    }

    /// Make every migration fail.
    pub fn failing(self) -> Self {
        self.with_step(|_, old, new| Err(PrefError::migration(old, new, "unsupported layout")))
    }

    pub fn calls(&self) -> Vec<(i32, i32)> {
        self.calls.lock().clone()
    }
}

impl PreferenceSchema for RecordingSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn migrate(&self, store: &dyn Store, old: i32, new: i32) -> PrefResult<()> {
        self.calls.lock().push((old, new));
        match &self.step {
            Some(step) => step(store, old, new),
            None => Ok(()),
        }
    }
}
