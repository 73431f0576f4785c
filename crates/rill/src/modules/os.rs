//! The `os` module: environment access, filesystem operations through the
//! configured [`crate::osfs::Fs`] abstraction, and the stdin/stdout handles.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    builtins::require_args,
    bytecode::Vm,
    errors::{Error, RunResult},
    types::{Builtin, BuiltinFn, File, Module, SharedReader, SharedWriter, ValueHasher},
    value::Value,
};

pub(crate) fn module(stdin: SharedReader, stdout: SharedWriter) -> Value {
    let mut attrs: IndexMap<String, Value, ValueHasher> = IndexMap::default();
    let functions: &[(&str, BuiltinFn)] = &[
        ("getenv", os_getenv),
        ("setenv", os_setenv),
        ("environ", os_environ),
        ("read_file", os_read_file),
        ("write_file", os_write_file),
        ("read_dir", os_read_dir),
        ("remove", os_remove),
        ("rename", os_rename),
        ("mkdir_all", os_mkdir_all),
        ("stat", os_stat),
    ];
    for (name, func) in functions {
        attrs.insert(
            (*name).to_owned(),
            Value::Builtin(Arc::new(Builtin::in_module(*name, "os", *func))),
        );
    }
    attrs.insert(
        "stdin".to_owned(),
        Value::File(Arc::new(File::reader("stdin", stdin))),
    );
    attrs.insert(
        "stdout".to_owned(),
        Value::File(Arc::new(File::writer("stdout", stdout))),
    );
    Value::Module(Arc::new(Module::with_builtins("os", attrs)))
}

fn expect_str<'a>(name: &str, value: &'a Value) -> RunResult<&'a str> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::type_error(format!(
            "os.{name}() expected a string (got {})",
            other.type_name()
        ))),
    }
}

fn os_getenv(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.getenv", 1, args)?;
    let name = expect_str("getenv", &args[0])?;
    match std::env::var(name) {
        Ok(value) => Ok(Value::from(value)),
        Err(_) => Ok(Value::from("")),
    }
}

fn os_setenv(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.setenv", 2, args)?;
    let name = expect_str("setenv", &args[0])?;
    let value = expect_str("setenv", &args[1])?;
    std::env::set_var(name, value);
    Ok(Value::Nil)
}

fn os_environ(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.environ", 0, args)?;
    let entries = std::env::vars()
        .map(|(name, value)| Value::from(format!("{name}={value}")))
        .collect();
    Ok(Value::list(entries))
}

fn os_read_file(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.read_file", 1, args)?;
    let path = expect_str("read_file", &args[0])?;
    let bytes = vm.core().fs.read_file(path)?;
    Ok(Value::from(String::from_utf8_lossy(&bytes).into_owned()))
}

fn os_write_file(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.write_file", 2, args)?;
    let path = expect_str("write_file", &args[0])?;
    let data = match &args[1] {
        Value::String(s) => s.as_bytes().to_vec(),
        Value::ByteSlice(bytes) => bytes.snapshot(),
        other => {
            return Err(Error::type_error(format!(
                "os.write_file() data must be a string or byte_slice (got {})",
                other.type_name()
            )));
        }
    };
    vm.core().fs.write_file(path, &data)?;
    Ok(Value::Nil)
}

fn os_read_dir(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.read_dir", 1, args)?;
    let path = expect_str("read_dir", &args[0])?;
    let entries = vm.core().fs.read_dir(path)?;
    Ok(Value::list(
        entries.into_iter().map(|e| Value::from(e.name)).collect(),
    ))
}

fn os_remove(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.remove", 1, args)?;
    let path = expect_str("remove", &args[0])?;
    vm.core().fs.remove(path)?;
    Ok(Value::Nil)
}

fn os_rename(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.rename", 2, args)?;
    let from = expect_str("rename", &args[0])?;
    let to = expect_str("rename", &args[1])?;
    vm.core().fs.rename(from, to)?;
    Ok(Value::Nil)
}

fn os_mkdir_all(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.mkdir_all", 1, args)?;
    let path = expect_str("mkdir_all", &args[0])?;
    vm.core().fs.mkdir_all(path)?;
    Ok(Value::Nil)
}

fn os_stat(vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("os.stat", 1, args)?;
    let path = expect_str("stat", &args[0])?;
    let stat = vm.core().fs.stat(path)?;
    let pairs = [
        (Value::from("name"), Value::from(stat.name)),
        (Value::from("size"), Value::Int(stat.size as i64)),
        (Value::from("is_dir"), Value::Bool(stat.is_dir)),
    ];
    let mut entries = IndexMap::default();
    for (key, value) in pairs {
        entries.insert(key.hash_key()?, crate::types::MapEntry { key, value });
    }
    Ok(Value::Map(Arc::new(crate::types::Map::new(entries))))
}
