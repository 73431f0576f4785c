use std::sync::Mutex;

use crate::value::Value;

/// A single-slot mutable box shared by every closure that captured the same
/// enclosing variable. Writes through one closure are visible to reads
/// through any other.
#[derive(Debug)]
pub struct Cell {
    slot: Mutex<Value>,
}

impl Cell {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            slot: Mutex::new(value),
        }
    }

    #[must_use]
    pub fn get(&self) -> Value {
        self.slot
            .lock()
            .expect("cell lock poisoned - a thread panicked while holding it")
            .clone()
    }

    pub fn set(&self, value: Value) {
        *self
            .slot
            .lock()
            .expect("cell lock poisoned - a thread panicked while holding it") = value;
    }
}
