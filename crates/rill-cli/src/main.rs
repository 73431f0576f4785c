//! The `rill` command-line runner.

use std::{
    io::{IsTerminal, Read},
    process::ExitCode,
};

use clap::Parser;
use rill::{eval, Context, EvalOptions, Value};
use tracing_subscriber::EnvFilter;

/// Run rill scripts.
#[derive(Debug, Parser)]
#[command(name = "rill", version, about = "Run rill scripts")]
struct Cli {
    /// Path of a script to execute.
    path: Option<String>,

    /// Inline source code to execute.
    #[arg(long)]
    code: Option<String>,

    /// Read source code from standard input.
    #[arg(long)]
    stdin: bool,

    /// Directory the local importer resolves modules against.
    #[arg(long)]
    modules: Option<String>,

    /// Start with an empty global set.
    #[arg(long)]
    no_default_globals: bool,

    /// Never enter interactive mode, even with a TTY.
    #[arg(long)]
    no_repl: bool,
}

impl Cli {
    /// Determines the source to execute. There are three possibilities:
    /// a path argument, `--code`, or `--stdin`; at most one may be used.
    fn source(&self) -> Result<Option<String>, String> {
        let selected =
            usize::from(self.path.is_some()) + usize::from(self.code.is_some()) + usize::from(self.stdin);
        if selected > 1 {
            return Err("multiple input sources specified".to_owned());
        }
        if self.stdin {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map_err(|err| format!("read stdin: {err}"))?;
            return Ok(Some(source));
        }
        if let Some(path) = &self.path {
            let source =
                std::fs::read_to_string(path).map_err(|err| format!("read {path}: {err}"))?;
            return Ok(Some(source));
        }
        Ok(self.code.clone())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let source = match cli.source() {
        Ok(Some(source)) => source,
        Ok(None) => {
            if std::io::stdin().is_terminal() && !cli.no_repl {
                eprintln!("rill: interactive mode is not available; pass a path, --code, or --stdin");
            } else {
                eprintln!("rill: no input provided (pass a path, --code, or --stdin)");
            }
            return ExitCode::FAILURE;
        }
        Err(message) => {
            eprintln!("rill: {message}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = EvalOptions::new().with_concurrency();
    if let Some(dir) = &cli.modules {
        options = options.with_modules_dir(dir.clone());
    }
    if cli.no_default_globals {
        options = options.without_default_globals();
    }

    let ctx = Context::new();
    tracing::debug!("evaluating source");
    match eval(&ctx, &source, &options) {
        Ok(Value::Nil) => ExitCode::SUCCESS,
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err.detail());
            ExitCode::FAILURE
        }
    }
}
