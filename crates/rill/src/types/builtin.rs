use crate::{bytecode::Vm, errors::RunResult, value::Value};

/// The signature of every host-provided callable. Builtins receive the
/// running VM so they can re-enter evaluation (`try`, `list.map`) and reach
/// the evaluation context (stdio, filesystem, cancellation).
pub type BuiltinFn = fn(&mut Vm, &[Value]) -> RunResult<Value>;

/// A host-provided callable: a name, a function pointer, the module it
/// belongs to (if any), and an optional bound receiver.
///
/// Attribute access on values produces bound builtins: `list.append`
/// resolves to a `Builtin` whose receiver is the list, prepended to the
/// arguments at call time.
#[derive(Debug)]
pub struct Builtin {
    name: String,
    module: Option<String>,
    func: BuiltinFn,
    receiver: Option<Value>,
}

impl Builtin {
    #[must_use]
    pub fn new(name: impl Into<String>, func: BuiltinFn) -> Self {
        Self {
            name: name.into(),
            module: None,
            func,
            receiver: None,
        }
    }

    #[must_use]
    pub fn in_module(name: impl Into<String>, module: impl Into<String>, func: BuiltinFn) -> Self {
        Self {
            name: name.into(),
            module: Some(module.into()),
            func,
            receiver: None,
        }
    }

    /// A builtin bound to a receiver value (a method).
    #[must_use]
    pub fn bound(name: impl Into<String>, receiver: Value, func: BuiltinFn) -> Self {
        Self {
            name: name.into(),
            module: None,
            func,
            receiver: Some(receiver),
        }
    }

    /// The qualified name, e.g. `strings.to_upper` or `list.append`.
    #[must_use]
    pub fn name(&self) -> String {
        match &self.module {
            Some(module) => format!("{module}.{}", self.name),
            None => self.name.clone(),
        }
    }

    #[must_use]
    pub fn func(&self) -> BuiltinFn {
        self.func
    }

    #[must_use]
    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }
}
