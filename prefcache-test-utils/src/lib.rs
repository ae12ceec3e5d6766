//! prefcache Test Utilities
//!
//! Centralized test infrastructure for the prefcache workspace:
//! - Store wrappers that count, fail, gate or rendezvous calls
//! - Proptest generators for keys and values
//! - Test fixtures for common store layouts
//! - Custom assertions for prefcache results

// Re-export the in-memory store from its source crate
pub use prefcache_storage::{MemoryStore, MemoryStoreFactory, Store, StoreFactory};

// Re-export core types for convenience
pub use prefcache_core::{
    PrefError, PrefKind, PrefResult, PrefValue, StorageError, StorageResult, TextSet,
    VERSION_KEY,
};

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Per-operation call counts recorded by [`CountingStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub get_all: usize,
    pub contains: usize,
    pub put: usize,
    pub remove: usize,
    pub clear: usize,
}

impl CallCounts {
    /// Every single-key and bulk read.
    pub fn reads(&self) -> usize {
        self.get + self.get_all + self.contains
    }

    /// Every mutating call.
    pub fn writes(&self) -> usize {
        self.put + self.remove + self.clear
    }
}

/// Store wrapper that counts calls to the inner store.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    get: AtomicUsize,
    get_all: AtomicUsize,
    contains: AtomicUsize,
    put: AtomicUsize,
    remove: AtomicUsize,
    clear: AtomicUsize,
}

impl<S: Store> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            get: AtomicUsize::new(0),
            get_all: AtomicUsize::new(0),
            contains: AtomicUsize::new(0),
            put: AtomicUsize::new(0),
            remove: AtomicUsize::new(0),
            clear: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Snapshot of the counters.
    pub fn counts(&self) -> CallCounts {
        CallCounts {
            get: self.get.load(Ordering::SeqCst),
            get_all: self.get_all.load(Ordering::SeqCst),
            contains: self.contains.load(Ordering::SeqCst),
            put: self.put.load(Ordering::SeqCst),
            remove: self.remove.load(Ordering::SeqCst),
            clear: self.clear.load(Ordering::SeqCst),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.get,
            &self.get_all,
            &self.contains,
            &self.put,
            &self.remove,
            &self.clear,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

impl<S: Store> Store for CountingStore<S> {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        self.get.fetch_add(1, Ordering::SeqCst);
        self.inner.get_value(key)
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        self.get_all.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all()
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        self.contains.fetch_add(1, Ordering::SeqCst);
        self.inner.contains(key)
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        self.put.fetch_add(1, Ordering::SeqCst);
        self.inner.put_value(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.remove.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        self.clear.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

// ============================================================================
// FAULTY STORE
// ============================================================================

/// Store wrapper whose reads or writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend {
                reason: "injected read failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

impl<S: Store> Store for FaultyStore<S> {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        self.check_read()?;
        self.inner.get_value(key)
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        self.check_read()?;
        self.inner.get_all()
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        self.check_read()?;
        self.inner.contains(key)
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        self.check_write(key)?;
        self.inner.put_value(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_write(key)?;
        self.inner.remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        self.check_write("*")?;
        self.inner.clear()
    }
}

// ============================================================================
// GATED STORE
// ============================================================================

#[derive(Debug, Default)]
struct GateState {
    entered: usize,
    open: bool,
}

/// Store wrapper that parks every write while the gate is closed.
///
/// Starts closed. Lets a test hold a writer inside its critical section and
/// observe what other threads can or cannot do meanwhile.
#[derive(Debug, Default)]
pub struct GatedStore<S> {
    inner: S,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl<S: Store> GatedStore<S> {
    /// Create a store whose writes block until opened.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Block until at least one write is parked at the gate.
    /// Returns false on timeout.
    pub fn wait_for_writer(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.entered == 0 {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.entered > 0;
            }
        }
        true
    }

    /// Let parked and future writes through.
    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }

    /// Park future writes again and forget earlier arrivals.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.entered = 0;
    }

    fn pass(&self) {
        let mut state = self.state.lock();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
    }
}

impl<S: Store> Store for GatedStore<S> {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        self.inner.get_value(key)
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        self.inner.get_all()
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        self.inner.contains(key)
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        self.pass();
        self.inner.put_value(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.pass();
        self.inner.remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        self.pass();
        self.inner.clear()
    }
}

// ============================================================================
// RENDEZVOUS STORE
// ============================================================================

#[derive(Debug, Default)]
struct Rendezvous {
    in_flight: usize,
    peak: usize,
}

/// Store wrapper whose `contains` waits until `parties` calls are in flight
/// at once (or a timeout passes). The peak overlap shows whether callers
/// were let through concurrently.
#[derive(Debug)]
pub struct RendezvousStore<S> {
    inner: S,
    parties: usize,
    timeout: Duration,
    state: Mutex<Rendezvous>,
    changed: Condvar,
}

impl<S: Store> RendezvousStore<S> {
    pub fn new(inner: S, parties: usize, timeout: Duration) -> Self {
        Self {
            inner,
            parties,
            timeout,
            state: Mutex::new(Rendezvous::default()),
            changed: Condvar::new(),
        }
    }

    /// Highest number of `contains` calls observed in flight together.
    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    /// Block until `n` calls are in flight. Returns false on timeout.
    pub fn wait_for_arrivals(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.in_flight < n {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.in_flight >= n;
            }
        }
        true
    }
}

impl<S: Store> Store for RendezvousStore<S> {
    fn get_value(&self, key: &str) -> StorageResult<Option<PrefValue>> {
        self.inner.get_value(key)
    }

    fn get_all(&self) -> StorageResult<HashMap<String, PrefValue>> {
        self.inner.get_all()
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        let deadline = Instant::now() + self.timeout;
        {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.peak = state.peak.max(state.in_flight);
            self.changed.notify_all();
            while state.peak < self.parties {
                if self.changed.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            state.in_flight -= 1;
            self.changed.notify_all();
        }
        self.inner.contains(key)
    }

    fn put_value(&self, key: &str, value: PrefValue) -> StorageResult<()> {
        self.inner.put_value(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.clear()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for preference keys and values.

    use super::*;
    use proptest::prelude::*;

    /// Generate a consumer key (never the reserved version key).
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}".prop_filter("reserved key", |k| k != VERSION_KEY)
    }

    /// Generate a value of any kind, including non-finite floats.
    pub fn arb_value() -> impl Strategy<Value = PrefValue> {
        prop_oneof![
            any::<bool>().prop_map(PrefValue::Bool),
            any::<i32>().prop_map(PrefValue::Int),
            any::<i64>().prop_map(PrefValue::Long),
            any::<f32>().prop_map(PrefValue::Float),
            "[ -~]{0,24}".prop_map(PrefValue::Text),
            prop::collection::btree_set("[a-z]{1,6}", 0..5).prop_map(PrefValue::TextSet),
        ]
    }

    /// Generate a small map of consumer entries.
    pub fn arb_entries() -> impl Strategy<Value = HashMap<String, PrefValue>> {
        prop::collection::hash_map(arb_key(), arb_value(), 0..16)
    }

    /// Generate a declared schema version.
    pub fn arb_version() -> impl Strategy<Value = i32> {
        1i32..64
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built stores for common scenarios.

    use super::*;

    /// A store written by a previous release at `version`.
    pub fn legacy_store(version: i32) -> MemoryStore {
        MemoryStore::with_entries([
            (VERSION_KEY, PrefValue::Int(version)),
            ("user_name", PrefValue::from("ada")),
            ("launch_count", PrefValue::Int(12)),
            ("dark_mode", PrefValue::Bool(true)),
        ])
    }

    /// A store holding one entry of every kind and no version tag.
    pub fn every_kind_store() -> MemoryStore {
        MemoryStore::with_entries([
            ("flag", PrefValue::Bool(true)),
            ("count", PrefValue::Int(-3)),
            ("installed_at", PrefValue::Long(1_700_000_000_000)),
            ("scale", PrefValue::Float(1.5)),
            ("name", PrefValue::from("grace")),
            ("tags", PrefValue::TextSet(text_set(&["beta", "pro"]))),
        ])
    }

    /// Build a text set from string slices.
    pub fn text_set(items: &[&str]) -> TextSet {
        items.iter().map(|s| s.to_string()).collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for prefcache results.

    use super::*;

    /// Assert that a PrefResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &PrefResult<T>) {
        match result {
            Err(PrefError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a PrefResult rejected the reserved key.
    #[track_caller]
    pub fn assert_reserved_key<T: std::fmt::Debug>(result: &PrefResult<T>) {
        match result {
            Err(PrefError::ReservedKey { key }) => assert_eq!(key, VERSION_KEY),
            other => panic!("Expected ReservedKey error, got: {:?}", other),
        }
    }

    /// Assert that a PrefResult is a TypeMismatch for the given kinds.
    #[track_caller]
    pub fn assert_type_mismatch<T: std::fmt::Debug>(
        result: &PrefResult<T>,
        expected: PrefKind,
        found: PrefKind,
    ) {
        match result {
            Err(PrefError::TypeMismatch {
                expected: e,
                found: f,
                ..
            }) => {
                assert_eq!(*e, expected, "Wrong expected kind in TypeMismatch");
                assert_eq!(*f, found, "Wrong found kind in TypeMismatch");
            }
            other => panic!(
                "Expected TypeMismatch {:?} vs {:?}, got: {:?}",
                expected, found, other
            ),
        }
    }

    /// Assert that the store holds `version` in its version tag.
    #[track_caller]
    pub fn assert_version_tag<S: Store + ?Sized>(store: &S, version: i32) {
        let stored = store
            .get_value(VERSION_KEY)
            .expect("version tag read should succeed");
        assert_eq!(stored, Some(PrefValue::Int(version)), "Unexpected version tag");
    }
}

// ============================================================================
// TESTS
// ============================================================================
