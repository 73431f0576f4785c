//! Built-in modules registered as default globals.

mod math;
mod os;
mod strings;

use indexmap::IndexMap;

use crate::{
    types::{SharedReader, SharedWriter, ValueHasher},
    value::Value,
};

/// Registers the default modules into a global name table. The `os` module
/// is wired to the evaluation's stdio streams.
pub(crate) fn register(
    globals: &mut IndexMap<String, Value, ValueHasher>,
    stdin: SharedReader,
    stdout: SharedWriter,
) {
    globals.insert("math".to_owned(), math::module());
    globals.insert("strings".to_owned(), strings::module());
    globals.insert("os".to_owned(), os::module(stdin, stdout));
}
