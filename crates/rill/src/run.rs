//! Public interface for evaluating rill code.

use std::{
    io::{Read, Write},
    sync::{Arc, Mutex},
};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    builtins,
    bytecode::{compile_with_globals, RuntimeCore, Vm},
    context::Context,
    errors::RunResult,
    importer::{Importer, LocalImporter, LocalImporterOptions},
    modules,
    osfs::{Fs, LocalFs},
    parser,
    types::{SharedReader, SharedWriter, ValueHasher},
    value::Value,
};

/// Configuration for one evaluation: host globals, the importer, whether
/// concurrency is allowed, the filesystem abstraction, and the stdio
/// streams.
#[derive(Clone)]
pub struct EvalOptions {
    globals: IndexMap<String, Value, ValueHasher>,
    importer: Option<Arc<dyn Importer>>,
    modules_dir: Option<String>,
    concurrency: bool,
    default_globals: bool,
    fs: Arc<dyn Fs>,
    stdin: SharedReader,
    stdout: SharedWriter,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            globals: IndexMap::default(),
            importer: None,
            modules_dir: None,
            concurrency: false,
            default_globals: true,
            fs: Arc::new(LocalFs::new(".")),
            stdin: Arc::new(Mutex::new(Box::new(std::io::stdin()) as Box<dyn Read + Send>)),
            stdout: Arc::new(Mutex::new(Box::new(std::io::stdout()) as Box<dyn Write + Send>)),
        }
    }
}

impl EvalOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one host-provided global. Host globals override default
    /// globals of the same name.
    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    /// Uses a custom importer for `import` statements.
    #[must_use]
    pub fn with_importer(mut self, importer: Arc<dyn Importer>) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Resolves imports against a local directory with the default
    /// extensions.
    #[must_use]
    pub fn with_modules_dir(mut self, dir: impl Into<String>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }

    /// Permits `go`, `spawn`, and channel creation.
    #[must_use]
    pub fn with_concurrency(mut self) -> Self {
        self.concurrency = true;
        self
    }

    /// Starts with an empty global set instead of the default builtins and
    /// modules.
    #[must_use]
    pub fn without_default_globals(mut self) -> Self {
        self.default_globals = false;
        self
    }

    /// Replaces the filesystem abstraction used by `os` and the importer.
    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn Fs>) -> Self {
        self.fs = fs;
        self
    }

    #[must_use]
    pub fn with_stdin(mut self, stdin: SharedReader) -> Self {
        self.stdin = stdin;
        self
    }

    /// Feeds `os.stdin` from an in-memory buffer.
    #[must_use]
    pub fn with_stdin_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        let cursor = std::io::Cursor::new(bytes.into());
        self.with_stdin(Arc::new(Mutex::new(Box::new(cursor) as Box<dyn Read + Send>)))
    }

    #[must_use]
    pub fn with_stdout(mut self, stdout: SharedWriter) -> Self {
        self.stdout = stdout;
        self
    }

    /// The global names scripts compiled under these options may reference,
    /// for hosts calling [`compile_with_globals`] directly.
    #[must_use]
    pub fn global_names(&self) -> Vec<String> {
        self.assemble_globals().keys().cloned().collect()
    }

    /// Builds the shared runtime state for hosts driving a [`Vm`] directly
    /// instead of calling [`eval`].
    #[must_use]
    pub fn build_runtime(&self) -> Arc<RuntimeCore> {
        let base_globals = self.assemble_globals();
        let global_names: Vec<String> = base_globals.keys().cloned().collect();
        let importer = match (&self.importer, &self.modules_dir) {
            (Some(importer), _) => Some(Arc::clone(importer)),
            (None, Some(dir)) => {
                let importer = LocalImporter::new(LocalImporterOptions {
                    source_dir: dir.clone(),
                    global_names,
                    ..LocalImporterOptions::default()
                });
                Some(Arc::new(importer) as Arc<dyn Importer>)
            }
            (None, None) => None,
        };
        Arc::new(RuntimeCore {
            base_globals,
            importer,
            modules: Mutex::new(AHashMap::default()),
            fs: Arc::clone(&self.fs),
            stdin: Arc::clone(&self.stdin),
            stdout: Arc::clone(&self.stdout),
            concurrency: self.concurrency,
        })
    }

    fn assemble_globals(&self) -> IndexMap<String, Value, ValueHasher> {
        let mut globals = IndexMap::default();
        if self.default_globals {
            builtins::register(&mut globals);
            modules::register(&mut globals, Arc::clone(&self.stdin), Arc::clone(&self.stdout));
        }
        for (name, value) in &self.globals {
            globals.insert(name.clone(), value.clone());
        }
        globals
    }
}

/// Evaluates source text in a fresh VM and returns the value of its final
/// expression.
///
/// # Example
/// ```
/// use rill::{eval, Context, EvalOptions, Value};
///
/// let result = eval(&Context::new(), "1 + 1", &EvalOptions::new()).unwrap();
/// assert_eq!(result, Value::Int(2));
/// ```
pub fn eval(ctx: &Context, source: &str, options: &EvalOptions) -> RunResult<Value> {
    let program = parser::parse(source)?;
    let core = options.build_runtime();
    let global_names: Vec<String> = core.base_globals.keys().cloned().collect();
    let code = compile_with_globals(&program, &global_names)?;
    let mut vm = Vm::new(core, ctx.clone());
    vm.run(&code)
}

/// An in-memory sink for captured stdout, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    #[must_use]
    pub fn contents(&self) -> String {
        let inner = self
            .inner
            .lock()
            .expect("capture buffer lock poisoned - a thread panicked while holding it");
        String::from_utf8_lossy(&inner).into_owned()
    }

    /// A shared writer handle suitable for [`EvalOptions::with_stdout`].
    #[must_use]
    pub fn shared_writer(&self) -> SharedWriter {
        Arc::new(Mutex::new(Box::new(self.clone()) as Box<dyn Write + Send>))
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner
            .lock()
            .expect("capture buffer lock poisoned - a thread panicked while holding it")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
