//! The closed set of runtime value kinds and their uniform capability
//! surface: type names, inspection, truthiness, equality, ordering, hashing,
//! item access, iteration, and binary/unary operator dispatch.
//!
//! Small values (ints, floats, bytes, bools, nil) are stored inline; every
//! other kind is shared behind an `Arc`. Mutable containers guard their
//! interior state so values stay `Send + Sync`; cross-thread visibility is
//! promised only through channels and cells.

use std::{cmp::Ordering, fmt, sync::Arc};

use crate::{
    builtins::methods,
    bytecode::op::{BinaryOp, UnaryOp},
    errors::{Error, RunResult},
    types::{
        Builtin, ByteSlice, Cell, Chan, Entry, ErrorValue, File, Function, Iter, List, Map,
        MapEntry, Module, Set, ThreadHandle,
    },
};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Byte(u8),
    String(Arc<str>),
    ByteSlice(Arc<ByteSlice>),
    List(Arc<List>),
    Map(Arc<Map>),
    Set(Arc<Set>),
    Error(Arc<ErrorValue>),
    Function(Arc<Function>),
    Builtin(Arc<Builtin>),
    Module(Arc<Module>),
    Cell(Arc<Cell>),
    Chan(Arc<Chan>),
    Iter(Arc<Iter>),
    Entry(Arc<Entry>),
    Thread(Arc<ThreadHandle>),
    File(Arc<File>),
}

/// The hashable projection of a value, used as the key type of maps and
/// sets. Only int, float (by bit pattern), bool, string, byte, and nil are
/// hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Int(i64),
    /// IEEE-754 bit pattern, so 1.5 and 1.5 collide and -0.0 != 0.0.
    Float(u64),
    Byte(u8),
    String(Arc<str>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(Arc::from(v.as_str()))
    }
}

impl Value {
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Arc::new(List::new(items)))
    }

    #[must_use]
    pub fn byte_slice(data: Vec<u8>) -> Self {
        Self::ByteSlice(Arc::new(ByteSlice::new(data)))
    }

    /// A raised error value; the VM propagates it like an exception.
    #[must_use]
    pub fn raised(error: Error) -> Self {
        Self::Error(Arc::new(ErrorValue::raised(error)))
    }

    /// The lowercase kind name used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Byte(_) => "byte",
            Self::String(_) => "string",
            Self::ByteSlice(_) => "byte_slice",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::Error(_) => "error",
            Self::Function(_) => "function",
            Self::Builtin(_) => "builtin",
            Self::Module(_) => "module",
            Self::Cell(_) => "cell",
            Self::Chan(_) => "chan",
            Self::Iter(_) => "iterator",
            Self::Entry(_) => "entry",
            Self::Thread(_) => "thread",
            Self::File(_) => "file",
        }
    }

    /// Developer-facing rendering: strings are quoted, containers render
    /// their elements with `inspect`.
    #[must_use]
    pub fn inspect(&self) -> String {
        match self {
            Self::String(s) => format!("{s:?}"),
            Self::Byte(b) => format!("byte({b})"),
            Self::ByteSlice(b) => format!("byte_slice({:?})", b.snapshot()),
            Self::Error(e) => format!("error({:?})", e.message()),
            Self::Function(f) => f.signature(),
            Self::Builtin(b) => format!("builtin({})", b.name()),
            Self::Module(m) => format!("module({})", m.name()),
            Self::Cell(c) => format!("cell({})", c.get().inspect()),
            Self::Chan(c) => format!("chan({})", c.capacity()),
            Self::Iter(i) => format!("{}()", i.kind()),
            Self::Entry(e) => format!("entry({}, {})", e.key.inspect(), e.value.inspect()),
            Self::Thread(_) => "thread()".to_owned(),
            Self::File(f) => format!("file({})", f.name()),
            _ => self.to_string(),
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Byte(b) => *b != 0,
            Self::String(s) => !s.is_empty(),
            Self::ByteSlice(b) => !b.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Set(s) => !s.is_empty(),
            Self::Error(e) => !e.is_raised(),
            _ => true,
        }
    }

    /// Element count for sized kinds; strings count characters.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::ByteSlice(b) => Some(b.len()),
            Self::List(l) => Some(l.len()),
            Self::Map(m) => Some(m.len()),
            Self::Set(s) => Some(s.len()),
            _ => None,
        }
    }

    /// Value equality. Numeric kinds compare across int/float/byte; most
    /// reference kinds compare by identity.
    #[must_use]
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::Int(a), Self::Byte(b)) | (Self::Byte(b), Self::Int(a)) => *a == i64::from(*b),
            (Self::Float(a), Self::Byte(b)) | (Self::Byte(b), Self::Float(a)) => {
                *a == f64::from(*b)
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::ByteSlice(a), Self::ByteSlice(b)) => {
                Arc::ptr_eq(a, b) || a.snapshot() == b.snapshot()
            }
            (Self::List(a), Self::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.snapshot();
                let b = b.snapshot();
                a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.equals(y))
            }
            (Self::Map(a), Self::Map(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter().all(|(key, entry)| {
                        b.get(key).is_some_and(|other| entry.value.equals(&other.value))
                    })
            }
            (Self::Set(a), Self::Set(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.keys().all(|key| b.contains_key(key))
            }
            (Self::Error(a), Self::Error(b)) => {
                a.message() == b.message() && a.is_raised() == b.is_raised()
            }
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => Arc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Arc::ptr_eq(a, b),
            (Self::Cell(a), Self::Cell(b)) => Arc::ptr_eq(a, b),
            (Self::Chan(a), Self::Chan(b)) => Arc::ptr_eq(a, b),
            (Self::Iter(a), Self::Iter(b)) => Arc::ptr_eq(a, b),
            (Self::Entry(a), Self::Entry(b)) => a.key.equals(&b.key) && a.value.equals(&b.value),
            (Self::Thread(a), Self::Thread(b)) => Arc::ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. Numeric kinds promote; any other
    /// cross-type comparison is a type error.
    pub fn compare(&self, other: &Value) -> RunResult<Ordering> {
        let incomparable = || {
            Error::type_error(format!(
                "unable to compare {} and {}",
                self.type_name(),
                other.type_name()
            ))
        };
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(a.cmp(b)),
            (Self::Byte(a), Self::Byte(b)) => Ok(a.cmp(b)),
            (Self::Int(a), Self::Byte(b)) => Ok(a.cmp(&i64::from(*b))),
            (Self::Byte(a), Self::Int(b)) => Ok(i64::from(*a).cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b).ok_or_else(incomparable),
            (Self::Int(a), Self::Float(b)) => {
                (*a as f64).partial_cmp(b).ok_or_else(incomparable)
            }
            (Self::Float(a), Self::Int(b)) => {
                a.partial_cmp(&(*b as f64)).ok_or_else(incomparable)
            }
            (Self::Byte(a), Self::Float(b)) => {
                f64::from(*a).partial_cmp(b).ok_or_else(incomparable)
            }
            (Self::Float(a), Self::Byte(b)) => {
                a.partial_cmp(&f64::from(*b)).ok_or_else(incomparable)
            }
            (Self::String(a), Self::String(b)) => Ok(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Ok(a.cmp(b)),
            (Self::Nil, Self::Nil) => Ok(Ordering::Equal),
            (Self::Error(a), Self::Error(b)) => Ok(a
                .message()
                .cmp(&b.message())
                .then(a.is_raised().cmp(&b.is_raised()))),
            _ => Err(incomparable()),
        }
    }

    /// The hash key for this value, or a type error for unhashable kinds.
    pub fn hash_key(&self) -> RunResult<HashKey> {
        match self {
            Self::Nil => Ok(HashKey::Nil),
            Self::Bool(b) => Ok(HashKey::Bool(*b)),
            Self::Int(i) => Ok(HashKey::Int(*i)),
            Self::Float(f) => Ok(HashKey::Float(f.to_bits())),
            Self::Byte(b) => Ok(HashKey::Byte(*b)),
            Self::String(s) => Ok(HashKey::String(Arc::clone(s))),
            other => Err(Error::type_error(format!(
                "unhashable type: {}",
                other.type_name()
            ))),
        }
    }

    /// Binary operator dispatch: `TOS(-1).binary_op(op, TOS)`.
    pub fn binary_op(&self, op: BinaryOp, right: &Value) -> RunResult<Value> {
        if op == BinaryOp::Contains {
            return contains(right, self);
        }
        match (self, right) {
            (Self::Int(a), Self::Int(b)) => int_op(*a, op, *b),
            (Self::Int(a), Self::Byte(b)) => int_op(*a, op, i64::from(*b)),
            (Self::Byte(a), Self::Int(b)) => int_op(i64::from(*a), op, *b),
            (Self::Byte(a), Self::Byte(b)) => int_op(i64::from(*a), op, i64::from(*b)),
            (Self::Float(a), Self::Float(b)) => float_op(*a, op, *b, self, right),
            (Self::Int(a), Self::Float(b)) => float_op(*a as f64, op, *b, self, right),
            (Self::Float(a), Self::Int(b)) => float_op(*a, op, *b as f64, self, right),
            (Self::Byte(a), Self::Float(b)) => float_op(f64::from(*a), op, *b, self, right),
            (Self::Float(a), Self::Byte(b)) => float_op(*a, op, f64::from(*b), self, right),
            (Self::String(a), Self::String(b)) if op == BinaryOp::Add => {
                let mut out = String::with_capacity(a.len() + b.len());
                out.push_str(a);
                out.push_str(b);
                Ok(Value::from(out))
            }
            (Self::List(a), Self::List(b)) if op == BinaryOp::Add => {
                let mut items = a.snapshot();
                items.extend(b.snapshot());
                Ok(Value::list(items))
            }
            (Self::ByteSlice(a), Self::ByteSlice(b)) if op == BinaryOp::Add => {
                let mut data = a.snapshot();
                data.extend(b.snapshot());
                Ok(Value::byte_slice(data))
            }
            _ => Err(unsupported_op(self, op, Some(right))),
        }
    }

    /// Unary negation.
    pub fn negate(&self) -> RunResult<Value> {
        match self {
            Self::Int(i) => Ok(Self::Int(i.wrapping_neg())),
            Self::Float(f) => Ok(Self::Float(-f)),
            Self::Byte(b) => Ok(Self::Int(-i64::from(*b))),
            _ => Err(Error::type_error(format!(
                "unsupported operation for {}: {}",
                self.type_name(),
                UnaryOp::Neg
            ))),
        }
    }

    /// Logical not; defined for every kind via truthiness.
    #[must_use]
    pub fn not(&self) -> Value {
        Self::Bool(!self.is_truthy())
    }

    /// `container[index]` access.
    pub fn get_item(&self, index: &Value) -> RunResult<Value> {
        match self {
            Self::List(list) => {
                let items = list.borrow();
                let i = normalize_index(index, items.len())?;
                Ok(items[i].clone())
            }
            Self::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = normalize_index(index, chars.len())?;
                Ok(Value::from(chars[i].to_string()))
            }
            Self::ByteSlice(bytes) => {
                let data = bytes.borrow();
                let i = normalize_index(index, data.len())?;
                Ok(Value::Byte(data[i]))
            }
            Self::Map(map) => {
                let key = index.hash_key()?;
                map.get(&key)
                    .ok_or_else(|| Error::key_error(format!("key not found: {}", index.inspect())))
            }
            _ => Err(Error::type_error(format!(
                "{} object is not subscriptable",
                self.type_name()
            ))),
        }
    }

    /// `container[index] = value` assignment.
    pub fn set_item(&self, index: &Value, value: Value) -> RunResult<()> {
        match self {
            Self::List(list) => {
                let mut items = list.borrow();
                let i = normalize_index(index, items.len())?;
                items[i] = value;
                Ok(())
            }
            Self::ByteSlice(bytes) => {
                let mut data = bytes.borrow();
                let i = normalize_index(index, data.len())?;
                match value {
                    Value::Byte(b) => data[i] = b,
                    Value::Int(n) if (0..=255).contains(&n) => data[i] = n as u8,
                    other => {
                        return Err(Error::type_error(format!(
                            "byte_slice items must be bytes (got {})",
                            other.type_name()
                        )));
                    }
                }
                Ok(())
            }
            Self::Map(map) => {
                let key = index.hash_key()?;
                map.insert(
                    key,
                    MapEntry {
                        key: index.clone(),
                        value,
                    },
                );
                Ok(())
            }
            _ => Err(Error::type_error(format!(
                "{} object does not support item assignment",
                self.type_name()
            ))),
        }
    }

    /// `container[start:stop]` slicing.
    pub fn slice(&self, start: &Value, stop: &Value) -> RunResult<Value> {
        match self {
            Self::List(list) => {
                let items = list.borrow();
                let (a, b) = normalize_slice(start, stop, items.len())?;
                Ok(Value::list(items[a..b].to_vec()))
            }
            Self::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (a, b) = normalize_slice(start, stop, chars.len())?;
                Ok(Value::from(chars[a..b].iter().collect::<String>()))
            }
            Self::ByteSlice(bytes) => {
                let data = bytes.borrow();
                let (a, b) = normalize_slice(start, stop, data.len())?;
                Ok(Value::byte_slice(data[a..b].to_vec()))
            }
            _ => Err(Error::type_error(format!(
                "{} object does not support slicing",
                self.type_name()
            ))),
        }
    }

    /// An iterator for this value, used by `range` loops and `iter`.
    pub fn iterate(&self) -> RunResult<Value> {
        let iter = match self {
            Self::Int(n) => Iter::ints(*n),
            Self::List(list) => Iter::list(list.snapshot()),
            Self::Map(map) => Iter::map(map.snapshot()),
            Self::Set(set) => Iter::set(set.snapshot()),
            Self::String(s) => Iter::string(s),
            Self::ByteSlice(bytes) => Iter::bytes(bytes.snapshot()),
            Self::Iter(iter) => return Ok(Self::Iter(Arc::clone(iter))),
            _ => {
                return Err(Error::type_error(format!(
                    "{} object is not iterable",
                    self.type_name()
                )));
            }
        };
        Ok(Self::Iter(Arc::new(iter)))
    }

    /// Attribute lookup. Returns `None` for unknown attributes; the VM
    /// raises the canonical type error.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        if let Self::Module(module) = self {
            return module.get_attr(name);
        }
        if let Self::Entry(entry) = self {
            return match name {
                "key" => Some(entry.key.clone()),
                "value" => Some(entry.value.clone()),
                _ => None,
            };
        }
        let method = methods::lookup(self, name)?;
        Some(Value::Builtin(Arc::new(Builtin::bound(
            format!("{}.{name}", self.type_name()),
            self.clone(),
            method,
        ))))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Byte(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.snapshot().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.inspect())?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, entry) in map.snapshot().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", entry.key.inspect(), entry.value.inspect())?;
                }
                write!(f, "}}")
            }
            Self::Set(set) => {
                write!(f, "{{")?;
                for (i, item) in set.snapshot().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.inspect())?;
                }
                write!(f, "}}")
            }
            Self::Error(e) => write!(f, "{}", e.message()),
            _ => write!(f, "{}", self.inspect()),
        }
    }
}

/// `PartialEq` delegates to value equality so tests and hosts can compare
/// results directly.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

fn unsupported_op(left: &Value, op: BinaryOp, right: Option<&Value>) -> Error {
    match right {
        Some(right) => Error::type_error(format!(
            "unsupported operation for {}: {op} on type {}",
            left.type_name(),
            right.type_name()
        )),
        None => Error::type_error(format!(
            "unsupported operation for {}: {op}",
            left.type_name()
        )),
    }
}

fn int_op(a: i64, op: BinaryOp, b: i64) -> RunResult<Value> {
    let result = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(Error::value_error("division by zero"));
            }
            a.wrapping_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(Error::value_error("division by zero"));
            }
            a.wrapping_rem(b)
        }
        // int ** int stays integral, wrapping to 64-bit signed
        BinaryOp::Pow => int_pow(a, b),
        BinaryOp::LShift => a.wrapping_shl(b as u32),
        BinaryOp::RShift => a.wrapping_shr(b as u32),
        BinaryOp::Contains => unreachable!("handled before numeric dispatch"),
    };
    Ok(Value::Int(result))
}

fn int_pow(base: i64, exp: i64) -> i64 {
    if exp < 0 {
        // matches truncation of the float result toward zero
        return (base as f64).powf(exp as f64) as i64;
    }
    let mut result: i64 = 1;
    let mut base = base;
    let mut exp = exp as u64;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}

fn float_op(a: f64, op: BinaryOp, b: f64, left: &Value, right: &Value) -> RunResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        // IEEE-754: float division by zero yields +/-Inf
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Pow => a.powf(b),
        _ => return Err(unsupported_op(left, op, Some(right))),
    };
    Ok(Value::Float(result))
}

/// Membership test: `item in container`.
fn contains(container: &Value, item: &Value) -> RunResult<Value> {
    match container {
        Value::List(list) => Ok(Value::Bool(list.borrow().iter().any(|v| v.equals(item)))),
        Value::Map(map) => {
            let key = item.hash_key()?;
            Ok(Value::Bool(map.contains(&key)))
        }
        Value::Set(set) => {
            let key = item.hash_key()?;
            Ok(Value::Bool(set.contains(&key)))
        }
        Value::String(s) => match item {
            Value::String(needle) => Ok(Value::Bool(s.contains(needle.as_ref()))),
            other => Err(Error::type_error(format!(
                "unsupported operation for string: in on type {}",
                other.type_name()
            ))),
        },
        Value::ByteSlice(bytes) => match item {
            Value::Byte(b) => Ok(Value::Bool(bytes.borrow().contains(b))),
            Value::Int(n) if (0..=255).contains(n) => {
                Ok(Value::Bool(bytes.borrow().contains(&(*n as u8))))
            }
            other => Err(Error::type_error(format!(
                "unsupported operation for byte_slice: in on type {}",
                other.type_name()
            ))),
        },
        other => Err(Error::type_error(format!(
            "unsupported operation for {}: in",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: &Value, len: usize) -> RunResult<usize> {
    let Value::Int(i) = index else {
        return Err(Error::type_error(format!(
            "index must be an int (got {})",
            index.type_name()
        )));
    };
    let len = len as i64;
    let resolved = if *i < 0 { len + *i } else { *i };
    if resolved < 0 || resolved >= len {
        return Err(Error::index_error(format!("index out of range: {i}")));
    }
    Ok(resolved as usize)
}

fn normalize_slice(start: &Value, stop: &Value, len: usize) -> RunResult<(usize, usize)> {
    let len = len as i64;
    let resolve = |value: &Value, default: i64| -> RunResult<i64> {
        match value {
            Value::Nil => Ok(default),
            Value::Int(i) => Ok(if *i < 0 { len + *i } else { *i }),
            other => Err(Error::type_error(format!(
                "slice indices must be ints (got {})",
                other.type_name()
            ))),
        }
    };
    let a = resolve(start, 0)?;
    let b = resolve(stop, len)?;
    if a < 0 || b > len {
        return Err(Error::index_error("slice index out of range"));
    }
    if a > b {
        return Err(Error::index_error("invalid slice range"));
    }
    Ok((a as usize, b as usize))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn numeric_equality_promotes() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Byte(3), Value::Int(3));
        assert!(!Value::Int(1).equals(&Value::from("1")));
    }

    #[test]
    fn addition_is_commutative_for_numbers() {
        let a = Value::Int(3);
        let b = Value::Float(1.5);
        assert_eq!(
            a.binary_op(BinaryOp::Add, &b).expect("add"),
            b.binary_op(BinaryOp::Add, &a).expect("add")
        );
    }

    #[test]
    fn int_division_by_zero_raises() {
        let err = Value::Int(1)
            .binary_op(BinaryOp::Div, &Value::Int(0))
            .expect_err("should fail");
        assert_eq!(err.to_string(), "value error: division by zero");
    }

    #[test]
    fn float_division_by_zero_is_inf() {
        let result = Value::Float(1.0)
            .binary_op(BinaryOp::Div, &Value::Float(0.0))
            .expect("div");
        assert_eq!(result, Value::Float(f64::INFINITY));
    }

    #[test]
    fn int_pow_wraps() {
        let result = Value::Int(2)
            .binary_op(BinaryOp::Pow, &Value::Int(64))
            .expect("pow");
        // 2**64 wraps to 0 in 64-bit signed arithmetic
        assert_eq!(result, Value::Int(0));
        let result = Value::Int(2)
            .binary_op(BinaryOp::Pow, &Value::Int(10))
            .expect("pow");
        assert_eq!(result, Value::Int(1024));
    }

    #[test]
    fn int_int_pow_stays_integer() {
        let result = Value::Int(3)
            .binary_op(BinaryOp::Pow, &Value::Int(2))
            .expect("pow");
        assert!(matches!(result, Value::Int(9)));
    }

    #[test]
    fn cross_type_comparison_is_type_error() {
        let err = Value::Int(1).compare(&Value::from("x")).expect_err("fail");
        assert_eq!(err.to_string(), "type error: unable to compare int and string");
    }

    #[test]
    fn unhashable_kinds_reject_hashing() {
        let err = Value::list(vec![]).hash_key().expect_err("fail");
        assert_eq!(err.to_string(), "type error: unhashable type: list");
    }

    #[test]
    fn negative_indices_count_from_end() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.get_item(&Value::Int(-1)).expect("get"), Value::Int(3));
        assert!(list.get_item(&Value::Int(3)).is_err());
    }

    #[test]
    fn string_indexing_uses_chars() {
        let s = Value::from("héllo");
        assert_eq!(s.get_item(&Value::Int(1)).expect("get"), Value::from("é"));
        assert_eq!(s.len(), Some(5));
    }

    #[test]
    fn slicing_lists() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let sliced = list.slice(&Value::Int(1), &Value::Nil).expect("slice");
        assert_eq!(sliced, Value::list(vec![Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn contains_on_string_and_list() {
        let s = Value::from("hello");
        let result = Value::from("ell")
            .binary_op(BinaryOp::Contains, &s)
            .expect("in");
        assert_eq!(result, Value::Bool(true));
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let result = Value::Int(2).binary_op(BinaryOp::Contains, &list).expect("in");
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn float_hash_uses_bit_pattern() {
        let a = Value::Float(1.5).hash_key().expect("hash");
        let b = Value::Float(1.5).hash_key().expect("hash");
        assert_eq!(a, b);
    }

    #[test]
    fn display_of_containers_quotes_strings() {
        let list = Value::list(vec![Value::from("a"), Value::Int(1)]);
        assert_eq!(list.to_string(), "[\"a\", 1]");
    }
}
