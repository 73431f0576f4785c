//! Module importers consumed by the `import` opcode.

use std::sync::Arc;

use crate::{
    bytecode::compile_with_globals,
    errors::{Error, RunResult},
    osfs::{Fs, LocalFs},
    parser,
    types::Module,
    value::Value,
};

/// Resolves a dotted module name to a module value. The VM executes the
/// module body on first import and caches the result per evaluation.
pub trait Importer: Send + Sync {
    fn import(&self, name: &str) -> RunResult<Value>;
}

/// Configuration for [`LocalImporter`].
pub struct LocalImporterOptions {
    /// Root directory module paths are resolved against.
    pub source_dir: String,
    /// File extensions tried in order; defaults to `.rill` then `.rl`.
    pub extensions: Vec<String>,
    /// Global names modules are compiled against.
    pub global_names: Vec<String>,
}

impl Default for LocalImporterOptions {
    fn default() -> Self {
        Self {
            source_dir: ".".to_owned(),
            extensions: vec![".rill".to_owned(), ".rl".to_owned()],
            global_names: Vec::new(),
        }
    }
}

/// An importer that resolves `a.b.c` against a root directory by joining
/// the dotted path with the path separator and trying each configured
/// extension. All reads go through the filesystem abstraction.
pub struct LocalImporter {
    fs: Arc<dyn Fs>,
    extensions: Vec<String>,
    global_names: Vec<String>,
}

impl LocalImporter {
    #[must_use]
    pub fn new(options: LocalImporterOptions) -> Self {
        Self {
            fs: Arc::new(LocalFs::new(options.source_dir)),
            extensions: options.extensions,
            global_names: options.global_names,
        }
    }

    /// Uses a caller-provided filesystem instead of a local directory.
    #[must_use]
    pub fn with_fs(fs: Arc<dyn Fs>, options: LocalImporterOptions) -> Self {
        Self {
            fs,
            extensions: options.extensions,
            global_names: options.global_names,
        }
    }
}

impl Importer for LocalImporter {
    fn import(&self, name: &str) -> RunResult<Value> {
        let relative = name.replace('.', "/");
        for extension in &self.extensions {
            let path = format!("{relative}{extension}");
            let Ok(bytes) = self.fs.read_file(&path) else {
                continue;
            };
            let source = String::from_utf8_lossy(&bytes).into_owned();
            let program = parser::parse_file(&source, &path)?;
            let code = compile_with_globals(&program, &self.global_names)?;
            let module = Module::from_code(name, code);
            return Ok(Value::Module(Arc::new(module)));
        }
        Err(Error::import_error(format!("module \"{name}\" not found")))
    }
}
