use std::sync::Mutex;

use super::map::MapEntry;
use crate::value::Value;

/// One iteration step: a position (index, key, or member) and the value at
/// that position. Scripts reach these through `.key` and `.value`.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug)]
enum IterState {
    /// Counts 0..stop; key and value are both the current integer.
    Int { next: i64, stop: i64 },
    List { items: Vec<Value>, pos: usize },
    Map { entries: Vec<MapEntry>, pos: usize },
    Set { items: Vec<Value>, pos: usize },
    /// Byte slice iteration: index keys, byte values.
    Slice { data: Vec<u8>, pos: usize },
    /// String iteration: rune-index keys, single-character string values.
    Str { chars: Vec<char>, pos: usize },
}

/// An iterator over a container snapshot, producing `(key, value)` entries.
///
/// Container iterators snapshot their source at creation time, so mutation
/// during iteration does not affect the produced entries.
#[derive(Debug)]
pub struct Iter {
    kind: &'static str,
    state: Mutex<IterState>,
}

impl Iter {
    #[must_use]
    pub fn ints(stop: i64) -> Self {
        Self {
            kind: "int_iter",
            state: Mutex::new(IterState::Int { next: 0, stop }),
        }
    }

    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Self {
            kind: "list_iter",
            state: Mutex::new(IterState::List { items, pos: 0 }),
        }
    }

    #[must_use]
    pub fn map(entries: Vec<MapEntry>) -> Self {
        Self {
            kind: "map_iter",
            state: Mutex::new(IterState::Map { entries, pos: 0 }),
        }
    }

    #[must_use]
    pub fn set(items: Vec<Value>) -> Self {
        Self {
            kind: "set_iter",
            state: Mutex::new(IterState::Set { items, pos: 0 }),
        }
    }

    #[must_use]
    pub fn bytes(data: Vec<u8>) -> Self {
        Self {
            kind: "slice_iter",
            state: Mutex::new(IterState::Slice { data, pos: 0 }),
        }
    }

    #[must_use]
    pub fn string(text: &str) -> Self {
        Self {
            kind: "string_iter",
            state: Mutex::new(IterState::Str {
                chars: text.chars().collect(),
                pos: 0,
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Advances the iterator, returning the next entry or `None` once
    /// exhausted.
    #[must_use]
    pub fn next_entry(&self) -> Option<Entry> {
        let mut state = self
            .state
            .lock()
            .expect("iterator lock poisoned - a thread panicked while holding it");
        match &mut *state {
            IterState::Int { next, stop } => {
                if *next >= *stop {
                    return None;
                }
                let current = *next;
                *next += 1;
                Some(Entry {
                    key: Value::Int(current),
                    value: Value::Int(current),
                })
            }
            IterState::List { items, pos } => {
                let value = items.get(*pos)?.clone();
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some(Entry { key, value })
            }
            IterState::Map { entries, pos } => {
                let entry = entries.get(*pos)?;
                let result = Entry {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                };
                *pos += 1;
                Some(result)
            }
            IterState::Set { items, pos } => {
                let value = items.get(*pos)?.clone();
                *pos += 1;
                Some(Entry {
                    key: value.clone(),
                    value,
                })
            }
            IterState::Slice { data, pos } => {
                let byte = *data.get(*pos)?;
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some(Entry {
                    key,
                    value: Value::Byte(byte),
                })
            }
            IterState::Str { chars, pos } => {
                let ch = *chars.get(*pos)?;
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some(Entry {
                    key,
                    value: Value::from(ch.to_string()),
                })
            }
        }
    }
}
