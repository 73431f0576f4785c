use std::sync::{Mutex, MutexGuard};

use crate::value::Value;

/// An ordered, mutable sequence of values.
#[derive(Debug, Default)]
pub struct List {
    items: Mutex<Vec<Value>>,
}

impl List {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub(crate) fn borrow(&self) -> MutexGuard<'_, Vec<Value>> {
        self.items
            .lock()
            .expect("list lock poisoned - a thread panicked while holding it")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.borrow().is_empty()
    }

    /// A point-in-time copy of the items (element handles are shared).
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.borrow().clone()
    }

    pub fn push(&self, value: Value) {
        self.borrow().push(value);
    }
}
