use std::sync::{Arc, RwLock};

use crate::{bytecode::Code, types::Cell, value::Value};

/// A function compiled to bytecode, optionally wrapped into a closure with
/// captured free-variable cells.
///
/// Functions are immutable after creation; closure creation produces a new
/// `Function` sharing the prototype's code and defaults.
#[derive(Debug)]
pub struct Function {
    name: Option<String>,
    params: Vec<String>,
    /// Parallel to `params`; defaults form a contiguous suffix.
    defaults: Vec<Option<Value>>,
    code: Arc<Code>,
    /// The globals of the module this function was created in.
    globals: Arc<RwLock<Vec<Value>>>,
    free: Vec<Arc<Cell>>,
}

impl Function {
    #[must_use]
    pub fn new(
        name: Option<String>,
        params: Vec<String>,
        defaults: Vec<Option<Value>>,
        code: Arc<Code>,
        globals: Arc<RwLock<Vec<Value>>>,
    ) -> Self {
        Self {
            name,
            params,
            defaults,
            code,
            globals,
            free: Vec::new(),
        }
    }

    /// Wraps a prototype with the cells captured for its free variables.
    #[must_use]
    pub fn closure(proto: &Self, globals: Arc<RwLock<Vec<Value>>>, free: Vec<Arc<Cell>>) -> Self {
        Self {
            name: proto.name.clone(),
            params: proto.params.clone(),
            defaults: proto.defaults.clone(),
            code: Arc::clone(&proto.code),
            globals,
            free,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn defaults(&self) -> &[Option<Value>] {
        &self.defaults
    }

    /// Number of leading parameters without default values.
    #[must_use]
    pub fn required_args(&self) -> usize {
        self.params.len() - self.defaults.iter().filter(|d| d.is_some()).count()
    }

    #[must_use]
    pub fn code(&self) -> &Arc<Code> {
        &self.code
    }

    #[must_use]
    pub fn globals(&self) -> &Arc<RwLock<Vec<Value>>> {
        &self.globals
    }

    #[must_use]
    pub fn free(&self) -> &[Arc<Cell>] {
        &self.free
    }

    /// Source-like rendering used by `inspect`.
    #[must_use]
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .zip(&self.defaults)
            .map(|(name, default)| match default {
                Some(value) => format!("{name}={}", value.inspect()),
                None => name.clone(),
            })
            .collect();
        match &self.name {
            Some(name) => format!("func {name}({}) {{ ... }}", params.join(", ")),
            None => format!("func({}) {{ ... }}", params.join(", ")),
        }
    }
}
