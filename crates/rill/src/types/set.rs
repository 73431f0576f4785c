use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;

use super::map::ValueHasher;
use crate::value::{HashKey, Value};

/// A set of hashable values. Insertion order is preserved for iteration;
/// the original values are retained alongside their hash keys.
#[derive(Debug, Default)]
pub struct Set {
    items: Mutex<IndexMap<HashKey, Value, ValueHasher>>,
}

impl Set {
    #[must_use]
    pub fn new(items: IndexMap<HashKey, Value, ValueHasher>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub(crate) fn borrow(&self) -> MutexGuard<'_, IndexMap<HashKey, Value, ValueHasher>> {
        self.items
            .lock()
            .expect("set lock poisoned - a thread panicked while holding it")
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
    pub fn contains(&self, key: &HashKey) -> bool {
        self.borrow().contains_key(key)
    }

    pub fn insert(&self, key: HashKey, value: Value) {
        self.borrow().insert(key, value);
    }

    /// Members in insertion order, as a point-in-time copy.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.borrow().values().cloned().collect()
    }
}
