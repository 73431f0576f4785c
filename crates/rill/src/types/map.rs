use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;

use crate::value::{HashKey, Value};

/// The hasher used by all `HashKey`-keyed containers.
pub type ValueHasher = ahash::RandomState;

/// One stored map entry: the original key value plus the mapped value. The
/// key value is retained so iteration can hand it back unchanged.
#[derive(Debug, Clone)]
pub struct MapEntry {
    pub key: Value,
    pub value: Value,
}

/// A mapping from hashable values to values. Insertion order is preserved
/// for iteration.
#[derive(Debug, Default)]
pub struct Map {
    entries: Mutex<IndexMap<HashKey, MapEntry, ValueHasher>>,
}

impl Map {
    #[must_use]
    pub fn new(entries: IndexMap<HashKey, MapEntry, ValueHasher>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub(crate) fn borrow(&self) -> MutexGuard<'_, IndexMap<HashKey, MapEntry, ValueHasher>> {
        self.entries
            .lock()
            .expect("map lock poisoned - a thread panicked while holding it")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &HashKey) -> Option<Value> {
        self.borrow().get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: HashKey, entry: MapEntry) {
        self.borrow().insert(key, entry);
    }

    #[must_use]
    pub fn contains(&self, key: &HashKey) -> bool {
        self.borrow().contains_key(key)
    }

    /// Entries in insertion order, as a point-in-time copy.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MapEntry> {
        self.borrow().values().cloned().collect()
    }
}
