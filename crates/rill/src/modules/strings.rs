//! The `strings` module. Every function takes the subject string as its
//! first argument, which makes these natural pipe stages.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    builtins::require_args,
    bytecode::Vm,
    errors::{Error, RunResult},
    types::{Builtin, BuiltinFn, Module, ValueHasher},
    value::Value,
};

pub(crate) fn module() -> Value {
    let mut attrs: IndexMap<String, Value, ValueHasher> = IndexMap::default();
    let functions: &[(&str, BuiltinFn)] = &[
        ("contains", strings_contains),
        ("count", strings_count),
        ("fields", strings_fields),
        ("has_prefix", strings_has_prefix),
        ("has_suffix", strings_has_suffix),
        ("index", strings_index),
        ("join", strings_join),
        ("repeat", strings_repeat),
        ("replace_all", strings_replace_all),
        ("split", strings_split),
        ("to_lower", strings_to_lower),
        ("to_upper", strings_to_upper),
        ("trim", strings_trim),
        ("trim_prefix", strings_trim_prefix),
        ("trim_suffix", strings_trim_suffix),
    ];
    for (name, func) in functions {
        attrs.insert(
            (*name).to_owned(),
            Value::Builtin(Arc::new(Builtin::in_module(*name, "strings", *func))),
        );
    }
    Value::Module(Arc::new(Module::with_builtins("strings", attrs)))
}

fn expect_str<'a>(name: &str, value: &'a Value) -> RunResult<&'a str> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::type_error(format!(
            "strings.{name}() expected a string (got {})",
            other.type_name()
        ))),
    }
}

fn strings_contains(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.contains", 2, args)?;
    let s = expect_str("contains", &args[0])?;
    let needle = expect_str("contains", &args[1])?;
    Ok(Value::Bool(s.contains(needle)))
}

fn strings_count(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.count", 2, args)?;
    let s = expect_str("count", &args[0])?;
    let needle = expect_str("count", &args[1])?;
    let count = if needle.is_empty() {
        s.chars().count() as i64 + 1
    } else {
        s.matches(needle).count() as i64
    };
    Ok(Value::Int(count))
}

fn strings_fields(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.fields", 1, args)?;
    let s = expect_str("fields", &args[0])?;
    Ok(Value::list(s.split_whitespace().map(Value::from).collect()))
}

fn strings_has_prefix(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.has_prefix", 2, args)?;
    let s = expect_str("has_prefix", &args[0])?;
    let prefix = expect_str("has_prefix", &args[1])?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

fn strings_has_suffix(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.has_suffix", 2, args)?;
    let s = expect_str("has_suffix", &args[0])?;
    let suffix = expect_str("has_suffix", &args[1])?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

fn strings_index(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.index", 2, args)?;
    let s = expect_str("index", &args[0])?;
    let needle = expect_str("index", &args[1])?;
    // the index is in characters, matching string indexing semantics
    let index = s
        .find(needle)
        .map_or(-1, |byte_index| s[..byte_index].chars().count() as i64);
    Ok(Value::Int(index))
}

fn strings_join(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.join", 2, args)?;
    let Value::List(list) = &args[0] else {
        return Err(Error::type_error(format!(
            "strings.join() expected a list (got {})",
            args[0].type_name()
        )));
    };
    let separator = expect_str("join", &args[1])?;
    let mut parts = Vec::with_capacity(list.len());
    for item in list.snapshot() {
        parts.push(expect_str("join", &item)?.to_owned());
    }
    Ok(Value::from(parts.join(separator)))
}

fn strings_repeat(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.repeat", 2, args)?;
    let s = expect_str("repeat", &args[0])?;
    let Value::Int(count) = &args[1] else {
        return Err(Error::type_error(format!(
            "strings.repeat() count must be an int (got {})",
            args[1].type_name()
        )));
    };
    if *count < 0 {
        return Err(Error::value_error("strings.repeat() count must be non-negative"));
    }
    Ok(Value::from(s.repeat(*count as usize)))
}

fn strings_replace_all(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.replace_all", 3, args)?;
    let s = expect_str("replace_all", &args[0])?;
    let old = expect_str("replace_all", &args[1])?;
    let new = expect_str("replace_all", &args[2])?;
    Ok(Value::from(s.replace(old, new)))
}

fn strings_split(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.split", 2, args)?;
    let s = expect_str("split", &args[0])?;
    let separator = expect_str("split", &args[1])?;
    Ok(Value::list(s.split(separator).map(Value::from).collect()))
}

fn strings_to_lower(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.to_lower", 1, args)?;
    Ok(Value::from(expect_str("to_lower", &args[0])?.to_lowercase()))
}

fn strings_to_upper(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.to_upper", 1, args)?;
    Ok(Value::from(expect_str("to_upper", &args[0])?.to_uppercase()))
}

fn strings_trim(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.trim", 1, args)?;
    Ok(Value::from(expect_str("trim", &args[0])?.trim()))
}

fn strings_trim_prefix(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.trim_prefix", 2, args)?;
    let s = expect_str("trim_prefix", &args[0])?;
    let prefix = expect_str("trim_prefix", &args[1])?;
    Ok(Value::from(s.strip_prefix(prefix).unwrap_or(s)))
}

fn strings_trim_suffix(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("strings.trim_suffix", 2, args)?;
    let s = expect_str("trim_suffix", &args[0])?;
    let suffix = expect_str("trim_suffix", &args[1])?;
    Ok(Value::from(s.strip_suffix(suffix).unwrap_or(s)))
}
