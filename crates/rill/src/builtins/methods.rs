//! Attribute methods for the built-in value kinds.
//!
//! Attribute access on a value resolves here; a hit produces a builtin
//! bound to the receiver, which arrives as the first argument at call time.

use std::sync::Arc;

use crate::{
    bytecode::Vm,
    errors::{Error, RunResult},
    types::{BuiltinFn, Entry},
    value::Value,
};

use super::{require_args, require_args_range};

/// Resolves an attribute name on a value to its method implementation.
pub(crate) fn lookup(value: &Value, name: &str) -> Option<BuiltinFn> {
    let method: BuiltinFn = match (value, name) {
        (Value::List(_), "append") => list_append,
        (Value::List(_), "extend") => list_extend,
        (Value::List(_), "pop") => list_pop,
        (Value::List(_), "clear") => list_clear,
        (Value::List(_), "reverse") => list_reverse,
        (Value::List(_), "contains") => list_contains,
        (Value::List(_), "map") => list_map,
        (Value::List(_), "filter") => list_filter,
        (Value::List(_), "each") => list_each,
        (Value::List(_), "sort") => list_sort,

        (Value::Map(_), "keys") => map_keys,
        (Value::Map(_), "values") => map_values,
        (Value::Map(_), "get") => map_get,
        (Value::Map(_), "pop") => map_pop,
        (Value::Map(_), "clear") => map_clear,
        (Value::Map(_), "update") => map_update,
        (Value::Map(_), "contains") => map_contains,

        (Value::Set(_), "add") => set_add,
        (Value::Set(_), "remove") => set_remove,
        (Value::Set(_), "clear") => set_clear,
        (Value::Set(_), "contains") => set_contains,
        (Value::Set(_), "items") => set_items,

        (Value::String(_), "contains") => str_contains,
        (Value::String(_), "has_prefix") => str_has_prefix,
        (Value::String(_), "has_suffix") => str_has_suffix,
        (Value::String(_), "to_upper") => str_to_upper,
        (Value::String(_), "to_lower") => str_to_lower,
        (Value::String(_), "split") => str_split,
        (Value::String(_), "trim") => str_trim,
        (Value::String(_), "replace_all") => str_replace_all,
        (Value::String(_), "fields") => str_fields,

        (Value::ByteSlice(_), "clone") => byteslice_clone,
        (Value::ByteSlice(_), "contains") => byteslice_contains,
        (Value::ByteSlice(_), "index") => byteslice_index,

        (Value::Error(_), "error") => error_message,
        (Value::Error(_), "message") => error_message,

        (Value::Function(_), "spawn") => function_spawn,

        (Value::Thread(_), "wait") => thread_wait,
        (Value::Thread(_), "cancel") => thread_cancel,
        (Value::Thread(_), "done") => thread_done,

        (Value::Chan(_), "len") => chan_len,
        (Value::Chan(_), "cap") => chan_cap,
        (Value::Chan(_), "close") => chan_close,

        (Value::File(_), "read") => file_read,
        (Value::File(_), "write") => file_write,
        (Value::File(_), "close") => file_close,
        (Value::File(_), "name") => file_name,

        (Value::Iter(_), "next") => iter_next,

        _ => return None,
    };
    Some(method)
}

fn receiver_list(args: &[Value]) -> &Arc<crate::types::List> {
    match &args[0] {
        Value::List(list) => list,
        _ => unreachable!("method bound to a list receiver"),
    }
}

fn receiver_str(args: &[Value]) -> &Arc<str> {
    match &args[0] {
        Value::String(s) => s,
        _ => unreachable!("method bound to a string receiver"),
    }
}

// --- list ---

fn list_append(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    if args.len() < 2 {
        return Err(Error::args_error("list.append() takes at least 1 argument (0 given)"));
    }
    let list = receiver_list(args);
    for item in &args[1..] {
        list.push(item.clone());
    }
    Ok(args[0].clone())
}

fn list_extend(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.extend", 2, args)?;
    let list = receiver_list(args);
    let iter = args[1].iterate()?;
    let Value::Iter(iter) = &iter else {
        unreachable!("iterate returns an iterator")
    };
    while let Some(entry) = iter.next_entry() {
        list.push(entry.value);
    }
    Ok(args[0].clone())
}

fn list_pop(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("list.pop", 1, 2, args)?;
    let list = receiver_list(args);
    let mut items = list.borrow();
    if let Some(index) = args.get(1) {
        let Value::Int(i) = index else {
            return Err(Error::type_error(format!(
                "list.pop() index must be an int (got {})",
                index.type_name()
            )));
        };
        let len = items.len() as i64;
        let resolved = if *i < 0 { len + *i } else { *i };
        if resolved < 0 || resolved >= len {
            return Err(Error::index_error(format!("index out of range: {i}")));
        }
        Ok(items.remove(resolved as usize))
    } else {
        items
            .pop()
            .ok_or_else(|| Error::index_error("pop from empty list"))
    }
}

fn list_clear(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.clear", 1, args)?;
    receiver_list(args).borrow().clear();
    Ok(args[0].clone())
}

fn list_reverse(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.reverse", 1, args)?;
    receiver_list(args).borrow().reverse();
    Ok(args[0].clone())
}

fn list_contains(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.contains", 2, args)?;
    let found = receiver_list(args).borrow().iter().any(|v| v.equals(&args[1]));
    Ok(Value::Bool(found))
}

fn list_map(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.map", 2, args)?;
    let items = receiver_list(args).snapshot();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(vm.call_value(&args[1], vec![item])?);
    }
    Ok(Value::list(out))
}

fn list_filter(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.filter", 2, args)?;
    let items = receiver_list(args).snapshot();
    let mut out = Vec::new();
    for item in items {
        if vm.call_value(&args[1], vec![item.clone()])?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

fn list_each(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.each", 2, args)?;
    for item in receiver_list(args).snapshot() {
        vm.call_value(&args[1], vec![item])?;
    }
    Ok(Value::Nil)
}

fn list_sort(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("list.sort", 1, args)?;
    let list = receiver_list(args);
    let mut items = list.borrow();
    let mut failure = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            std::cmp::Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(args[0].clone()),
    }
}

// --- map ---

fn receiver_map(args: &[Value]) -> &Arc<crate::types::Map> {
    match &args[0] {
        Value::Map(map) => map,
        _ => unreachable!("method bound to a map receiver"),
    }
}

fn map_keys(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("map.keys", 1, args)?;
    let keys = receiver_map(args)
        .snapshot()
        .into_iter()
        .map(|entry| entry.key)
        .collect();
    Ok(Value::list(keys))
}

fn map_values(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("map.values", 1, args)?;
    let values = receiver_map(args)
        .snapshot()
        .into_iter()
        .map(|entry| entry.value)
        .collect();
    Ok(Value::list(values))
}

fn map_get(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("map.get", 2, 3, args)?;
    let key = args[1].hash_key()?;
    match receiver_map(args).get(&key) {
        Some(value) => Ok(value),
        None => Ok(args.get(2).cloned().unwrap_or(Value::Nil)),
    }
}

fn map_pop(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("map.pop", 2, 3, args)?;
    let key = args[1].hash_key()?;
    let removed = receiver_map(args).borrow().shift_remove(&key);
    match removed {
        Some(entry) => Ok(entry.value),
        None => Ok(args.get(2).cloned().unwrap_or(Value::Nil)),
    }
}

fn map_clear(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("map.clear", 1, args)?;
    receiver_map(args).borrow().clear();
    Ok(args[0].clone())
}

fn map_update(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("map.update", 2, args)?;
    let Value::Map(other) = &args[1] else {
        return Err(Error::type_error(format!(
            "map.update() argument must be a map (got {})",
            args[1].type_name()
        )));
    };
    let entries = other.snapshot();
    let map = receiver_map(args);
    for entry in entries {
        let key = entry.key.hash_key()?;
        map.insert(key, entry);
    }
    Ok(args[0].clone())
}

fn map_contains(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("map.contains", 2, args)?;
    let key = args[1].hash_key()?;
    Ok(Value::Bool(receiver_map(args).contains(&key)))
}

// --- set ---

fn receiver_set(args: &[Value]) -> &Arc<crate::types::Set> {
    match &args[0] {
        Value::Set(set) => set,
        _ => unreachable!("method bound to a set receiver"),
    }
}

fn set_add(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("set.add", 2, args)?;
    let key = args[1].hash_key()?;
    receiver_set(args).insert(key, args[1].clone());
    Ok(args[0].clone())
}

fn set_remove(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("set.remove", 2, args)?;
    let key = args[1].hash_key()?;
    let removed = receiver_set(args).borrow().shift_remove(&key).is_some();
    Ok(Value::Bool(removed))
}

fn set_clear(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("set.clear", 1, args)?;
    receiver_set(args).borrow().clear();
    Ok(args[0].clone())
}

fn set_contains(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("set.contains", 2, args)?;
    let key = args[1].hash_key()?;
    Ok(Value::Bool(receiver_set(args).contains(&key)))
}

fn set_items(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("set.items", 1, args)?;
    Ok(Value::list(receiver_set(args).snapshot()))
}

// --- string ---

fn expect_str<'a>(method: &str, value: &'a Value) -> RunResult<&'a str> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::type_error(format!(
            "{method}() argument must be a string (got {})",
            other.type_name()
        ))),
    }
}

fn str_contains(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.contains", 2, args)?;
    let needle = expect_str("string.contains", &args[1])?;
    Ok(Value::Bool(receiver_str(args).contains(needle)))
}

fn str_has_prefix(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.has_prefix", 2, args)?;
    let prefix = expect_str("string.has_prefix", &args[1])?;
    Ok(Value::Bool(receiver_str(args).starts_with(prefix)))
}

fn str_has_suffix(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.has_suffix", 2, args)?;
    let suffix = expect_str("string.has_suffix", &args[1])?;
    Ok(Value::Bool(receiver_str(args).ends_with(suffix)))
}

fn str_to_upper(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.to_upper", 1, args)?;
    Ok(Value::from(receiver_str(args).to_uppercase()))
}

fn str_to_lower(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.to_lower", 1, args)?;
    Ok(Value::from(receiver_str(args).to_lowercase()))
}

fn str_split(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.split", 2, args)?;
    let separator = expect_str("string.split", &args[1])?;
    let parts = receiver_str(args)
        .split(separator)
        .map(Value::from)
        .collect();
    Ok(Value::list(parts))
}

fn str_trim(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("string.trim", 1, 2, args)?;
    let s = receiver_str(args);
    let trimmed = match args.get(1) {
        Some(cutset) => {
            let cutset = expect_str("string.trim", cutset)?;
            let chars: Vec<char> = cutset.chars().collect();
            s.trim_matches(|c| chars.contains(&c))
        }
        None => s.trim(),
    };
    Ok(Value::from(trimmed))
}

fn str_replace_all(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.replace_all", 3, args)?;
    let old = expect_str("string.replace_all", &args[1])?;
    let new = expect_str("string.replace_all", &args[2])?;
    Ok(Value::from(receiver_str(args).replace(old, new)))
}

fn str_fields(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("string.fields", 1, args)?;
    let fields = receiver_str(args)
        .split_whitespace()
        .map(Value::from)
        .collect();
    Ok(Value::list(fields))
}

// --- byte_slice ---

fn receiver_bytes(args: &[Value]) -> &Arc<crate::types::ByteSlice> {
    match &args[0] {
        Value::ByteSlice(bytes) => bytes,
        _ => unreachable!("method bound to a byte_slice receiver"),
    }
}

fn expect_byte(method: &str, value: &Value) -> RunResult<u8> {
    match value {
        Value::Byte(b) => Ok(*b),
        Value::Int(n) if (0..=255).contains(n) => Ok(*n as u8),
        other => Err(Error::type_error(format!(
            "{method}() argument must be a byte (got {})",
            other.type_name()
        ))),
    }
}

fn byteslice_clone(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("byte_slice.clone", 1, args)?;
    Ok(Value::byte_slice(receiver_bytes(args).snapshot()))
}

fn byteslice_contains(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("byte_slice.contains", 2, args)?;
    let byte = expect_byte("byte_slice.contains", &args[1])?;
    Ok(Value::Bool(receiver_bytes(args).borrow().contains(&byte)))
}

fn byteslice_index(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("byte_slice.index", 2, args)?;
    let byte = expect_byte("byte_slice.index", &args[1])?;
    let index = receiver_bytes(args)
        .borrow()
        .iter()
        .position(|b| *b == byte)
        .map_or(-1, |i| i as i64);
    Ok(Value::Int(index))
}

// --- error ---

fn error_message(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("error.message", 1, args)?;
    match &args[0] {
        Value::Error(err) => Ok(Value::from(err.message())),
        _ => unreachable!("method bound to an error receiver"),
    }
}

// --- function ---

fn function_spawn(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    vm.spawn_value(args[0].clone(), args[1..].to_vec())
}

// --- thread ---

fn receiver_thread(args: &[Value]) -> &Arc<crate::types::ThreadHandle> {
    match &args[0] {
        Value::Thread(handle) => handle,
        _ => unreachable!("method bound to a thread receiver"),
    }
}

fn thread_wait(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("thread.wait", 1, args)?;
    let handle = Arc::clone(receiver_thread(args));
    handle.wait(vm.context())
}

fn thread_cancel(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("thread.cancel", 1, args)?;
    receiver_thread(args).cancel();
    Ok(Value::Nil)
}

fn thread_done(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("thread.done", 1, args)?;
    Ok(Value::Bool(receiver_thread(args).is_done()))
}

// --- chan ---

fn receiver_chan(args: &[Value]) -> &Arc<crate::types::Chan> {
    match &args[0] {
        Value::Chan(chan) => chan,
        _ => unreachable!("method bound to a chan receiver"),
    }
}

fn chan_len(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("chan.len", 1, args)?;
    Ok(Value::Int(receiver_chan(args).len() as i64))
}

fn chan_cap(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("chan.cap", 1, args)?;
    Ok(Value::Int(receiver_chan(args).capacity() as i64))
}

fn chan_close(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("chan.close", 1, args)?;
    receiver_chan(args).close()?;
    Ok(Value::Nil)
}

// --- file ---

fn receiver_file(args: &[Value]) -> &Arc<crate::types::File> {
    match &args[0] {
        Value::File(file) => file,
        _ => unreachable!("method bound to a file receiver"),
    }
}

fn file_read(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("file.read", 1, args)?;
    Ok(Value::from(receiver_file(args).read_all()?))
}

fn file_write(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("file.write", 2, args)?;
    let data = match &args[1] {
        Value::String(s) => s.as_bytes().to_vec(),
        Value::ByteSlice(bytes) => bytes.snapshot(),
        other => {
            return Err(Error::type_error(format!(
                "file.write() argument must be a string or byte_slice (got {})",
                other.type_name()
            )));
        }
    };
    let written = receiver_file(args).write(&data)?;
    Ok(Value::Int(written as i64))
}

fn file_close(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("file.close", 1, args)?;
    receiver_file(args).close();
    Ok(Value::Nil)
}

fn file_name(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("file.name", 1, args)?;
    Ok(Value::from(receiver_file(args).name()))
}

// --- iterator ---

fn iter_next(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("iterator.next", 1, args)?;
    let Value::Iter(iter) = &args[0] else {
        unreachable!("method bound to an iterator receiver")
    };
    match iter.next_entry() {
        Some(Entry { key, value }) => Ok(Value::Entry(Arc::new(Entry { key, value }))),
        None => Ok(Value::Nil),
    }
}
