use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};

use indexmap::IndexMap;

use super::map::ValueHasher;
use crate::{bytecode::Code, value::Value};

/// A named collection of values: host-provided builtin attributes plus, for
/// source-compiled modules, the indexed globals its code declares.
#[derive(Debug)]
pub struct Module {
    name: String,
    builtins: IndexMap<String, Value, ValueHasher>,
    code: Option<Arc<Code>>,
    globals: Arc<RwLock<Vec<Value>>>,
    globals_index: IndexMap<String, usize, ValueHasher>,
    /// Whether the module body has been executed yet.
    initialized: AtomicBool,
}

impl Module {
    /// A module backed entirely by host-provided attributes (the shape used
    /// by `math`, `strings`, and `os`).
    #[must_use]
    pub fn with_builtins(name: impl Into<String>, builtins: IndexMap<String, Value, ValueHasher>) -> Self {
        Self {
            name: name.into(),
            builtins,
            code: None,
            globals: Arc::new(RwLock::new(Vec::new())),
            globals_index: IndexMap::default(),
            initialized: AtomicBool::new(true),
        }
    }

    /// A module compiled from source. Its globals start out nil and are
    /// populated when the VM executes the module body on first import.
    #[must_use]
    pub fn from_code(name: impl Into<String>, code: Arc<Code>) -> Self {
        let names = code.global_names();
        let mut globals_index = IndexMap::default();
        for (i, global) in names.iter().enumerate() {
            globals_index.insert(global.clone(), i);
        }
        let globals = Arc::new(RwLock::new(vec![Value::Nil; names.len()]));
        Self {
            name: name.into(),
            builtins: IndexMap::default(),
            code: Some(code),
            globals,
            globals_index,
            initialized: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn code(&self) -> Option<&Arc<Code>> {
        self.code.as_ref()
    }

    #[must_use]
    pub fn globals(&self) -> &Arc<RwLock<Vec<Value>>> {
        &self.globals
    }

    /// Marks the module body as executed; returns whether it still needed
    /// executing.
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    /// Fills global slots whose names match host-provided values, before the
    /// module body executes.
    pub fn seed_globals(&self, base: &IndexMap<String, Value, ValueHasher>) {
        let Some(code) = &self.code else { return };
        let mut globals = self
            .globals
            .write()
            .expect("module globals lock poisoned - a thread panicked while holding it");
        for (i, name) in code.global_names().iter().enumerate() {
            if let Some(value) = base.get(name) {
                globals[i] = value.clone();
            }
        }
    }

    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        if name == "__name__" {
            return Some(Value::from(self.name.as_str()));
        }
        if let Some(value) = self.builtins.get(name) {
            return Some(value.clone());
        }
        let index = *self.globals_index.get(name)?;
        let globals = self
            .globals
            .read()
            .expect("module globals lock poisoned - a thread panicked while holding it");
        globals.get(index).cloned()
    }
}
