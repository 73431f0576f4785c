use std::fmt::{self, Display};

use strum::Display as StrumDisplay;

use crate::token::Position;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, Error>;

/// Error categories raised by the pipeline and the VM.
///
/// The strum `Display` derive renders each kind's stable message prefix; the
/// full message is always `"<prefix>: <detail>"` so host code and tests can
/// match on exact strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
pub enum ErrorKind {
    /// Lexer or parser failure; fatal to the source unit.
    #[strum(serialize = "syntax error")]
    Syntax,
    /// Undefined variable, const reassignment, invalid defaults, and other
    /// scope/shape failures detected at compile time.
    #[strum(serialize = "compile error")]
    Compile,
    /// Operator or attribute applied to an incompatible kind, or an
    /// unhashable value used as a key.
    #[strum(serialize = "type error")]
    Type,
    /// Domain-correct type with invalid content (bad int literal, division
    /// by zero, unpack count mismatch).
    #[strum(serialize = "value error")]
    Value,
    /// Wrong arity at a function or builtin call site.
    #[strum(serialize = "args error")]
    Args,
    /// Out-of-range access on a list, slice, or string.
    #[strum(serialize = "index error")]
    Index,
    /// Missing map key on strict access.
    #[strum(serialize = "key error")]
    Key,
    /// The importer could not produce a module.
    #[strum(serialize = "import error")]
    Import,
    /// Evaluation-environment failures: stack exhaustion, disabled
    /// concurrency, I/O surfaced from the OS abstraction.
    #[strum(serialize = "eval error")]
    Eval,
    /// The cancellation context fired during execution.
    #[strum(serialize = "cancelled")]
    Cancelled,
}

/// Source span attached to syntax errors for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSpan {
    /// File name, when the source came from a file.
    pub file: Option<String>,
    pub start: Position,
    pub end: Position,
    /// The full text of the offending source line.
    pub line_text: String,
}

/// An error produced while lexing, parsing, compiling, or running a script.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    span: Option<SourceSpan>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn syntax(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compile, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn args_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Args, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Index, message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Key, message)
    }

    pub fn import_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message)
    }

    pub fn eval_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Eval, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "context cancelled")
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn span(&self) -> Option<&SourceSpan> {
        self.span.as_ref()
    }

    /// Multi-line rendering including the offending source line, for CLI
    /// output. Falls back to the one-line `Display` form when no span is
    /// attached.
    #[must_use]
    pub fn detail(&self) -> String {
        let Some(span) = &self.span else {
            return self.to_string();
        };
        let mut out = self.to_string();
        if let Some(file) = &span.file {
            out.push_str(&format!("\n  file: {file}"));
        }
        out.push_str(&format!(
            "\n  line {}, column {}:",
            span.start.line + 1,
            span.start.column + 1
        ));
        out.push_str(&format!("\n    {}", span.line_text));
        let caret_pad = " ".repeat(span.start.column as usize);
        out.push_str(&format!("\n    {caret_pad}^"));
        out
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kind_prefix() {
        let err = Error::compile("undefined variable \"foo\" (line 1)");
        assert_eq!(
            err.to_string(),
            "compile error: undefined variable \"foo\" (line 1)"
        );
    }

    #[test]
    fn detail_includes_source_line() {
        let err = Error::syntax(
            "invalid syntax (unexpected \")\")",
            SourceSpan {
                file: Some("main.rill".to_owned()),
                start: Position {
                    line: 0,
                    column: 4,
                    offset: 4,
                },
                end: Position {
                    line: 0,
                    column: 5,
                    offset: 5,
                },
                line_text: "1 + )".to_owned(),
            },
        );
        let detail = err.detail();
        assert!(detail.contains("main.rill"));
        assert!(detail.contains("1 + )"));
        assert!(detail.contains("line 1, column 5"));
    }
}
