//! Injected key-value store.
//!
//! One small interface serves two jobs: memoizing computed placement
//! tables, and atomic `insert_if_absent` flags for mutual exclusion (one
//! sync per dataset). Entries never expire on their own; eviction is always
//! an explicit `remove`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

/// Byte-valued key-value store with an atomic insert-if-absent.
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value.
    fn get(&self, key: &str) -> Option<Bytes>;

    /// Store a value, replacing any existing one.
    fn set(&self, key: &str, value: Bytes);

    /// Store a value only if the key is vacant. Returns `true` if this call
    /// inserted the value. This is the primitive sync locks are built on.
    fn insert_if_absent(&self, key: &str, value: Bytes) -> bool;

    /// Remove a value, returning it if it was present.
    fn remove(&self, key: &str) -> Option<Bytes>;
}

/// In-process implementation backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Bytes>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Bytes>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<Bytes> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Bytes) {
        self.write().insert(key.to_string(), value);
    }

    fn insert_if_absent(&self, key: &str, value: Bytes) -> bool {
        let mut entries = self.write();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value);
        true
    }

    fn remove(&self, key: &str) -> Option<Bytes> {
        self.write().remove(key)
    }
}

// =============================================================================
// Tests
// =============================================================================
