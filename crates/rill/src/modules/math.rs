//! The `math` module.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    builtins::{require_args, require_args_range},
    bytecode::Vm,
    errors::{Error, RunResult},
    types::{Builtin, BuiltinFn, Module, ValueHasher},
    value::Value,
};

pub(crate) fn module() -> Value {
    let mut attrs: IndexMap<String, Value, ValueHasher> = IndexMap::default();
    let functions: &[(&str, BuiltinFn)] = &[
        ("abs", math_abs),
        ("ceil", math_ceil),
        ("floor", math_floor),
        ("max", math_max),
        ("min", math_min),
        ("pow", math_pow),
        ("round", math_round),
        ("sqrt", math_sqrt),
        ("sum", math_sum),
    ];
    for (name, func) in functions {
        attrs.insert(
            (*name).to_owned(),
            Value::Builtin(Arc::new(Builtin::in_module(*name, "math", *func))),
        );
    }
    attrs.insert("PI".to_owned(), Value::Float(std::f64::consts::PI));
    attrs.insert("E".to_owned(), Value::Float(std::f64::consts::E));
    attrs.insert("inf".to_owned(), Value::Float(f64::INFINITY));
    Value::Module(Arc::new(Module::with_builtins("math", attrs)))
}

fn as_float(name: &str, value: &Value) -> RunResult<f64> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        Value::Byte(b) => Ok(f64::from(*b)),
        other => Err(Error::type_error(format!(
            "math.{name}() expected a number (got {})",
            other.type_name()
        ))),
    }
}

fn math_abs(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.abs", 1, args)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Byte(b) => Ok(Value::Byte(*b)),
        other => Err(Error::type_error(format!(
            "math.abs() expected a number (got {})",
            other.type_name()
        ))),
    }
}

fn math_ceil(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.ceil", 1, args)?;
    Ok(Value::Float(as_float("ceil", &args[0])?.ceil()))
}

fn math_floor(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.floor", 1, args)?;
    Ok(Value::Float(as_float("floor", &args[0])?.floor()))
}

fn math_round(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.round", 1, args)?;
    Ok(Value::Float(as_float("round", &args[0])?.round()))
}

fn math_sqrt(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.sqrt", 1, args)?;
    Ok(Value::Float(as_float("sqrt", &args[0])?.sqrt()))
}

fn math_pow(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.pow", 2, args)?;
    let base = as_float("pow", &args[0])?;
    let exp = as_float("pow", &args[1])?;
    Ok(Value::Float(base.powf(exp)))
}

/// Accepts either a single list of numbers or two or more number arguments.
fn spread_values(name: &str, args: &[Value]) -> RunResult<Vec<Value>> {
    let values = match args {
        [Value::List(list)] => list.snapshot(),
        _ => args.to_vec(),
    };
    if values.is_empty() {
        return Err(Error::value_error(format!("math.{name}() of empty sequence")));
    }
    Ok(values)
}

fn math_min(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("math.min", 1, usize::MAX, args)?;
    let values = spread_values("min", args)?;
    let mut best = values[0].clone();
    for value in &values[1..] {
        if value.compare(&best)?.is_lt() {
            best = value.clone();
        }
    }
    Ok(best)
}

fn math_max(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args_range("math.max", 1, usize::MAX, args)?;
    let values = spread_values("max", args)?;
    let mut best = values[0].clone();
    for value in &values[1..] {
        if value.compare(&best)?.is_gt() {
            best = value.clone();
        }
    }
    Ok(best)
}

fn math_sum(_vm: &mut Vm, args: &[Value]) -> RunResult<Value> {
    require_args("math.sum", 1, args)?;
    let Value::List(list) = &args[0] else {
        return Err(Error::type_error(format!(
            "math.sum() expected a list (got {})",
            args[0].type_name()
        )));
    };
    let mut total = Value::Int(0);
    for value in list.snapshot() {
        total = total.binary_op(crate::bytecode::op::BinaryOp::Add, &value)?;
    }
    Ok(total)
}
