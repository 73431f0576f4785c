#![doc = include_str!("../../../README.md")]

mod ast;
mod builtins;
mod bytecode;
mod context;
mod errors;
mod importer;
mod lexer;
mod modules;
mod osfs;
mod parser;
mod run;
mod token;
mod types;
mod value;

pub use crate::{
    ast::{Block, Expr, Ident, Program, Stmt},
    bytecode::{compile, compile_with_globals, Code, Compiler, RuntimeCore, Vm},
    context::{CancelToken, Context},
    errors::{Error, ErrorKind, RunResult, SourceSpan},
    importer::{Importer, LocalImporter, LocalImporterOptions},
    lexer::Lexer,
    osfs::{DirEntry, FileStat, Fs, LocalFs, OpenFlags},
    parser::{parse, parse_file, Parser},
    run::{eval, CaptureBuffer, EvalOptions},
    token::{Position, Token, TokenType},
    types::{SharedReader, SharedWriter},
    value::{HashKey, Value},
};
