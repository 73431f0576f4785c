//! Global builtin functions available to every script (unless the host
//! disables default globals).

pub(crate) mod methods;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    bytecode::Vm,
    errors::{Error, ErrorKind, RunResult},
    types::{Builtin, Chan, Map, MapEntry, Set, ValueHasher},
    value::{HashKey, Value},
};

/// Registers the default global builtins into a name table.
pub(crate) fn register(globals: &mut IndexMap<String, Value, ValueHasher>) {
    let entries: &[(&str, crate::types::BuiltinFn)] = &[
        ("all", builtin_all),
        ("any", builtin_any),
        ("assert", builtin_assert),
        ("bool", builtin_bool),
        ("byte", builtin_byte),
        ("byte_slice", builtin_byte_slice),
        ("chan", builtin_chan),
        ("chr", builtin_chr),
        ("close", builtin_close),
        ("error", builtin_error),
        ("float", builtin_float),
        ("int", builtin_int),
        ("iter", builtin_iter),
        ("keys", builtin_keys),
        ("len", builtin_len),
        ("list", builtin_list),
        ("map", builtin_map),
        ("ord", builtin_ord),
        ("print", builtin_print),
        ("printf", builtin_printf),
        ("set", builtin_set),
        ("sorted", builtin_sorted),
        ("sprintf", builtin_sprintf),
        ("string", builtin_string),
        ("try", builtin_try),
        ("type", builtin_type),
    ];
    for (name, func) in entries {
        globals.insert(
            (*name).to_owned(),
            Value::Builtin(Arc::new(Builtin::new(*name, *func))),
        );
    }
}

pub(crate) fn require_args(name: &str, count: usize, args: &[Value]) -> RunResult<()> {
    if args.len() == count {
        return Ok(());
    }
    let plural = if count == 1 { "argument" } else { "arguments" };
    Err(Error::args_error(format!(
        "{name}() takes exactly {count} {plural} ({} given)",
        args.len()
    )))
}

pub(crate) fn require_args_range(name: &str, min: usize, max: usize, args: &[Value]) -> RunResult<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    Err(Error::args_error(format!(
        "{name}() takes {min} to {max} arguments ({} given)",
        args.len()
    )))
}

fn iterate_values(value: &Value) -> RunResult<Vec<Value>> {
    let iter = value.iterate()?;
    let Value::Iter(iter) = &iter else {
        unreachable!("iterate returns an iterator")
    };
    let mut out = Vec::new();
    while let Some(entry) = iter.next_entry() {
        out.push(entry.value);
    }
    Ok(out)
}

fn builtin_all(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("all", 1, args)?;
    Ok(Value::Bool(
        iterate_values(&args[0])?.iter().all(Value::is_truthy),
    ))
}

fn builtin_any(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("any", 1, args)?;
    Ok(Value::Bool(
        iterate_values(&args[0])?.iter().any(Value::is_truthy),
    ))
}

fn builtin_assert(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("assert", 1, 2, args)?;
    if args[0].is_truthy() {
        return Ok(Value::Nil);
    }
    match args.get(1) {
        Some(message) => Err(Error::eval_error(format!("assertion failed: {message}"))),
        None => Err(Error::eval_error("assertion failed")),
    }
}

fn builtin_bool(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("bool", 0, 1, args)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn builtin_byte(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("byte", 1, args)?;
    match &args[0] {
        Value::Byte(b) => Ok(Value::Byte(*b)),
        Value::Int(n) if (0..=255).contains(n) => Ok(Value::Byte(*n as u8)),
        Value::Float(f) if (0.0..=255.0).contains(f) => Ok(Value::Byte(*f as u8)),
        other => Err(Error::value_error(format!(
            "unable to convert {} to byte",
            other.inspect()
        ))),
    }
}

fn builtin_byte_slice(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("byte_slice", 0, 1, args)?;
    let data = match args.first() {
        None => Vec::new(),
        Some(Value::String(s)) => s.as_bytes().to_vec(),
        Some(Value::ByteSlice(bytes)) => bytes.snapshot(),
        Some(Value::List(list)) => {
            let mut data = Vec::with_capacity(list.len());
            for item in list.snapshot() {
                match item {
                    Value::Byte(b) => data.push(b),
                    Value::Int(n) if (0..=255).contains(&n) => data.push(n as u8),
                    other => {
                        return Err(Error::type_error(format!(
                            "byte_slice() items must be bytes (got {})",
                            other.type_name()
                        )));
                    }
                }
            }
            data
        }
        Some(other) => {
            return Err(Error::type_error(format!(
                "unable to convert {} to byte_slice",
                other.type_name()
            )));
        }
    };
    Ok(Value::byte_slice(data))
}

fn builtin_chan(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("chan", 0, 1, args)?;
    if !vm.core().concurrency {
        return Err(Error::eval_error("concurrency is not permitted"));
    }
    let capacity = match args.first() {
        None => 0,
        Some(Value::Int(n)) if *n >= 0 => *n as usize,
        Some(other) => {
            return Err(Error::type_error(format!(
                "chan() capacity must be a non-negative int (got {})",
                other.inspect()
            )));
        }
    };
    Ok(Value::Chan(Arc::new(Chan::new(capacity))))
}

fn builtin_chr(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("chr", 1, args)?;
    let Value::Int(code) = &args[0] else {
        return Err(Error::type_error(format!(
            "chr() argument must be an int (got {})",
            args[0].type_name()
        )));
    };
    u32::try_from(*code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::from(c.to_string()))
        .ok_or_else(|| Error::value_error(format!("invalid character code: {code}")))
}

fn builtin_close(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("close", 1, args)?;
    let Value::Chan(chan) = &args[0] else {
        return Err(Error::type_error(format!(
            "close() argument must be a chan (got {})",
            args[0].type_name()
        )));
    };
    chan.close()?;
    Ok(Value::Nil)
}

fn builtin_error(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    if args.is_empty() {
        return Err(Error::args_error("error() takes at least 1 argument (0 given)"));
    }
    let message = match &args[0] {
        Value::String(format) if args.len() > 1 => sprintf(format, &args[1..])?,
        value => value.to_string(),
    };
    Ok(Value::raised(Error::new(ErrorKind::Value, message)))
}

fn builtin_float(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("float", 1, args)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Byte(b) => Ok(Value::Float(f64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::value_error(format!("invalid float literal: {s:?}"))),
        other => Err(Error::type_error(format!(
            "unable to convert {} to float",
            other.type_name()
        ))),
    }
}

fn builtin_int(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("int", 1, args)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Byte(b) => Ok(Value::Int(i64::from(*b))),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::value_error(format!("invalid int literal: {s:?}"))),
        other => Err(Error::type_error(format!(
            "unable to convert {} to int",
            other.type_name()
        ))),
    }
}

fn builtin_iter(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("iter", 1, args)?;
    args[0].iterate()
}

fn builtin_keys(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("keys", 1, args)?;
    let Value::Map(map) = &args[0] else {
        return Err(Error::type_error(format!(
            "keys() argument must be a map (got {})",
            args[0].type_name()
        )));
    };
    let keys = map.snapshot().into_iter().map(|entry| entry.key).collect();
    Ok(Value::list(keys))
}

fn builtin_len(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("len", 1, args)?;
    match args[0].len() {
        Some(len) => Ok(Value::Int(len as i64)),
        None => Err(Error::type_error(format!(
            "len() is unsupported for {} objects",
            args[0].type_name()
        ))),
    }
}

fn builtin_list(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("list", 0, 1, args)?;
    match args.first() {
        None => Ok(Value::list(Vec::new())),
        Some(value) => Ok(Value::list(iterate_values(value)?)),
    }
}

fn builtin_map(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("map", 0, 1, args)?;
    let mut entries: IndexMap<HashKey, MapEntry, ValueHasher> = IndexMap::default();
    match args.first() {
        None => {}
        Some(Value::Map(map)) => {
            for entry in map.snapshot() {
                entries.insert(entry.key.hash_key()?, entry);
            }
        }
        Some(Value::List(list)) => {
            for item in list.snapshot() {
                let Value::List(pair) = &item else {
                    return Err(Error::type_error(
                        "map() list items must be [key, value] pairs",
                    ));
                };
                let pair = pair.snapshot();
                if pair.len() != 2 {
                    return Err(Error::type_error(
                        "map() list items must be [key, value] pairs",
                    ));
                }
                entries.insert(
                    pair[0].hash_key()?,
                    MapEntry {
                        key: pair[0].clone(),
                        value: pair[1].clone(),
                    },
                );
            }
        }
        Some(other) => {
            return Err(Error::type_error(format!(
                "unable to convert {} to map",
                other.type_name()
            )));
        }
    }
    Ok(Value::Map(Arc::new(Map::new(entries))))
}

fn builtin_ord(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("ord", 1, args)?;
    let Value::String(s) = &args[0] else {
        return Err(Error::type_error(format!(
            "ord() argument must be a string (got {})",
            args[0].type_name()
        )));
    };
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
        _ => Err(Error::value_error(format!(
            "ord() expected a single character (got {s:?})"
        ))),
    }
}

fn builtin_print(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    let line = format!("{}\n", rendered.join(" "));
    write_stdout(vm, line.as_bytes())?;
    Ok(Value::Nil)
}

fn builtin_printf(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    if args.is_empty() {
        return Err(Error::args_error("printf() takes at least 1 argument (0 given)"));
    }
    let Value::String(format) = &args[0] else {
        return Err(Error::type_error(format!(
            "printf() format must be a string (got {})",
            args[0].type_name()
        )));
    };
    let rendered = sprintf(format, &args[1..])?;
    write_stdout(vm, rendered.as_bytes())?;
    Ok(Value::Nil)
}

fn write_stdout(vm: &mut Vm, data: &[u8]) -> RunResult<()> {
    use std::io::Write;
    let stdout = Arc::clone(&vm.core().stdout);
    let mut stdout = stdout
        .lock()
        .expect("stdout lock poisoned - a thread panicked while holding it");
    stdout
        .write_all(data)
        .and_then(|()| stdout.flush())
        .map_err(|err| Error::eval_error(format!("write stdout: {err}")))
}

fn builtin_set(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("set", 0, 1, args)?;
    let mut entries: IndexMap<HashKey, Value, ValueHasher> = IndexMap::default();
    if let Some(value) = args.first() {
        for item in iterate_values(value)? {
            entries.insert(item.hash_key()?, item);
        }
    }
    Ok(Value::Set(Arc::new(Set::new(entries))))
}

fn builtin_sorted(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("sorted", 1, args)?;
    let mut values = iterate_values(&args[0])?;
    let mut failure = None;
    values.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            std::cmp::Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::list(values)),
    }
}

fn builtin_sprintf(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    if args.is_empty() {
        return Err(Error::args_error("sprintf() takes at least 1 argument (0 given)"));
    }
    let Value::String(format) = &args[0] else {
        return Err(Error::type_error(format!(
            "sprintf() format must be a string (got {})",
            args[0].type_name()
        )));
    };
    Ok(Value::from(sprintf(format, &args[1..])?))
}

fn builtin_string(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string", 1, args)?;
    Ok(Value::from(args[0].to_string()))
}

fn builtin_try(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("try", 1, 2, args)?;
    match vm.call_value(&args[0], Vec::new()) {
        Ok(value) => Ok(value),
        // our own context's cancellation is not recoverable; a cancelled
        // error received from elsewhere (a thread handle) is
        Err(err) if err.kind() == ErrorKind::Cancelled && vm.context().is_cancelled() => Err(err),
        Err(err) => {
            let recovered = Value::Error(Arc::new(crate::types::ErrorValue::plain(err)));
            match args.get(1) {
                None => Ok(recovered),
                Some(fallback @ (Value::Function(_) | Value::Builtin(_))) => {
                    vm.call_value(fallback, vec![recovered])
                }
                Some(fallback) => Ok(fallback.clone()),
            }
        }
    }
}

fn builtin_type(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("type", 1, args)?;
    Ok(Value::from(args[0].type_name()))
}

/// A small printf-style formatter supporting `%v`, `%s`, `%d`, `%f`, `%t`,
/// `%q`, and `%%`.
pub(crate) fn sprintf(format: &str, args: &[Value]) -> RunResult<String> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();
    let mut next_arg = 0usize;
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(verb) = chars.next() else {
            return Err(Error::value_error("sprintf format ends with %"));
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next_arg) else {
            return Err(Error::value_error(format!(
                "sprintf missing argument for %{verb}"
            )));
        };
        next_arg += 1;
        match verb {
            'v' | 's' => out.push_str(&arg.to_string()),
            'd' => match arg {
                Value::Int(n) => out.push_str(&n.to_string()),
                Value::Byte(b) => out.push_str(&b.to_string()),
                Value::Float(f) => out.push_str(&(*f as i64).to_string()),
                other => {
                    return Err(Error::value_error(format!(
                        "sprintf %d expects a number (got {})",
                        other.type_name()
                    )));
                }
            },
            'f' => match arg {
                Value::Float(f) => out.push_str(&format!("{f:.6}")),
                Value::Int(n) => out.push_str(&format!("{:.6}", *n as f64)),
                other => {
                    return Err(Error::value_error(format!(
                        "sprintf %f expects a number (got {})",
                        other.type_name()
                    )));
                }
            },
            't' => out.push_str(if arg.is_truthy() { "true" } else { "false" }),
            'q' => out.push_str(&arg.inspect()),
            other => {
                return Err(Error::value_error(format!(
                    "sprintf has unsupported verb %{other}"
                )));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprintf_verbs() {
        let out = sprintf(
            "%v %s %d %t %q %%",
            &[
                Value::Int(1),
                Value::from("two"),
                Value::Int(3),
                Value::Bool(true),
                Value::from("q"),
            ],
        )
        .expect("format");
        assert_eq!(out, "1 two 3 true \"q\" %");
    }

    #[test]
    fn sprintf_missing_argument() {
        let err = sprintf("%d", &[]).expect_err("should fail");
        assert_eq!(err.to_string(), "value error: sprintf missing argument for %d");
    }
}
