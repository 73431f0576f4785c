//! AST produced by the parser and consumed by the bytecode compiler.
//!
//! Every node keeps its originating token so diagnostics can point back at
//! the source.

use std::fmt::{self, Display};

use crate::token::{Token, TokenType};

/// An identifier with its source token.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub token: Token,
}

impl Ident {
    #[must_use]
    pub fn new(token: Token) -> Self {
        Self { token }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.token.literal
    }
}

/// A braced sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub token: Token,
    pub statements: Vec<Stmt>,
}

/// One `case`/`default` arm of a switch. `exprs` is `None` for the default
/// arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub token: Token,
    pub exprs: Option<Vec<Expr>>,
    pub body: Block,
}

/// A single name imported by a `from` statement, with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportItem {
    pub name: Ident,
    pub alias: Option<Ident>,
}

/// The left side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Ident(Ident),
    Index { object: Box<Expr>, index: Box<Expr> },
}

/// The operator family of an assignment expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `:=`
    Declare,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
}

/// One piece of a template string: literal text or an interpolated
/// expression. An empty `{}` fragment renders as the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Option<Box<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var {
        token: Token,
        name: Ident,
        value: Expr,
    },
    Const {
        token: Token,
        name: Ident,
        value: Expr,
    },
    /// `a, b := expr` or `var a, b = expr`; the value is unpacked.
    MultiVar {
        token: Token,
        names: Vec<Ident>,
        value: Expr,
        declares: bool,
    },
    Return {
        token: Token,
        value: Option<Expr>,
    },
    Break {
        token: Token,
    },
    Continue {
        token: Token,
    },
    Import {
        token: Token,
        name: Ident,
        alias: Option<Ident>,
    },
    FromImport {
        token: Token,
        path: Vec<Ident>,
        imports: Vec<ImportItem>,
    },
    Defer {
        token: Token,
        call: Expr,
    },
    Go {
        token: Token,
        call: Expr,
    },
    /// `x++` / `x--`
    Postfix {
        token: Token,
        name: Ident,
        op: TokenType,
    },
    Expr(Expr),
}

impl Stmt {
    #[must_use]
    pub fn token(&self) -> &Token {
        match self {
            Self::Var { token, .. }
            | Self::Const { token, .. }
            | Self::MultiVar { token, .. }
            | Self::Return { token, .. }
            | Self::Break { token }
            | Self::Continue { token }
            | Self::Import { token, .. }
            | Self::FromImport { token, .. }
            | Self::Defer { token, .. }
            | Self::Go { token, .. }
            | Self::Postfix { token, .. } => token,
            Self::Expr(expr) => expr.token(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    Int {
        token: Token,
        value: i64,
    },
    Float {
        token: Token,
        value: f64,
    },
    Str {
        token: Token,
        value: String,
    },
    Template {
        token: Token,
        parts: Vec<TemplatePart>,
    },
    Bool {
        token: Token,
        value: bool,
    },
    Nil {
        token: Token,
    },
    List {
        token: Token,
        items: Vec<Expr>,
    },
    Map {
        token: Token,
        pairs: Vec<(Expr, Expr)>,
    },
    Set {
        token: Token,
        items: Vec<Expr>,
    },
    Prefix {
        token: Token,
        op: TokenType,
        right: Box<Expr>,
    },
    Infix {
        token: Token,
        op: TokenType,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        token: Token,
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    If {
        token: Token,
        cond: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    /// The infinite, condition, and C-style `for` forms.
    For {
        token: Token,
        init: Option<Box<Stmt>>,
        cond: Option<Box<Expr>>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    /// `for x := range expr { }` with one or two binding variables.
    ForRange {
        token: Token,
        vars: Vec<Ident>,
        iterable: Box<Expr>,
        body: Block,
    },
    Switch {
        token: Token,
        value: Box<Expr>,
        cases: Vec<Case>,
    },
    Func {
        token: Token,
        name: Option<Ident>,
        params: Vec<Ident>,
        /// Parallel to `params`; `Some` entries are default value expressions.
        defaults: Vec<Option<Expr>>,
        body: Block,
    },
    Call {
        token: Token,
        function: Box<Expr>,
        args: Vec<Expr>,
    },
    GetAttr {
        token: Token,
        object: Box<Expr>,
        name: Ident,
    },
    Index {
        token: Token,
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        token: Token,
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
    },
    Range {
        token: Token,
        container: Box<Expr>,
    },
    Pipe {
        token: Token,
        stages: Vec<Expr>,
    },
    In {
        token: Token,
        item: Box<Expr>,
        container: Box<Expr>,
    },
    Send {
        token: Token,
        channel: Box<Expr>,
        value: Box<Expr>,
    },
    Receive {
        token: Token,
        channel: Box<Expr>,
    },
    Assign {
        token: Token,
        target: AssignTarget,
        op: AssignOp,
        value: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub fn token(&self) -> &Token {
        match self {
            Self::Ident(ident) => &ident.token,
            Self::Int { token, .. }
            | Self::Float { token, .. }
            | Self::Str { token, .. }
            | Self::Template { token, .. }
            | Self::Bool { token, .. }
            | Self::Nil { token }
            | Self::List { token, .. }
            | Self::Map { token, .. }
            | Self::Set { token, .. }
            | Self::Prefix { token, .. }
            | Self::Infix { token, .. }
            | Self::Ternary { token, .. }
            | Self::If { token, .. }
            | Self::For { token, .. }
            | Self::ForRange { token, .. }
            | Self::Switch { token, .. }
            | Self::Func { token, .. }
            | Self::Call { token, .. }
            | Self::GetAttr { token, .. }
            | Self::Index { token, .. }
            | Self::Slice { token, .. }
            | Self::Range { token, .. }
            | Self::Pipe { token, .. }
            | Self::In { token, .. }
            | Self::Send { token, .. }
            | Self::Receive { token, .. }
            | Self::Assign { token, .. } => token,
        }
    }
}

impl Display for Expr {
    /// A compact source-like rendering used in diagnostics such as
    /// `unsupported default value (got <expr>, line N)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(ident) => write!(f, "{}", ident.name()),
            Self::Int { token, .. } | Self::Float { token, .. } => write!(f, "{}", token.literal),
            Self::Str { value, .. } => write!(f, "{value:?}"),
            Self::Template { token, .. } => write!(f, "'{}'", token.literal),
            Self::Bool { value, .. } => write!(f, "{value}"),
            Self::Nil { .. } => write!(f, "nil"),
            Self::List { items, .. } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map { .. } => write!(f, "{{...}}"),
            Self::Set { .. } => write!(f, "{{...}}"),
            Self::Prefix { token, right, .. } => write!(f, "{}{right}", token.literal),
            Self::Infix { token, left, right, .. } => write!(f, "{left} {} {right}", token.literal),
            Self::Ternary {
                cond,
                if_true,
                if_false,
                ..
            } => write!(f, "{cond} ? {if_true} : {if_false}"),
            Self::If { .. } => write!(f, "if {{...}}"),
            Self::For { .. } | Self::ForRange { .. } => write!(f, "for {{...}}"),
            Self::Switch { .. } => write!(f, "switch {{...}}"),
            Self::Func { name, .. } => match name {
                Some(name) => write!(f, "func {}() {{...}}", name.name()),
                None => write!(f, "func() {{...}}"),
            },
            Self::Call { function, args, .. } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::GetAttr { object, name, .. } => write!(f, "{object}.{}", name.name()),
            Self::Index { object, index, .. } => write!(f, "{object}[{index}]"),
            Self::Slice { object, .. } => write!(f, "{object}[..]"),
            Self::Range { container, .. } => write!(f, "range {container}"),
            Self::Pipe { stages, .. } => {
                for (i, stage) in stages.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{stage}")?;
                }
                Ok(())
            }
            Self::In { item, container, .. } => write!(f, "{item} in {container}"),
            Self::Send { channel, value, .. } => write!(f, "{channel} <- {value}"),
            Self::Receive { channel, .. } => write!(f, "<-{channel}"),
            Self::Assign { target, value, token, .. } => {
                match target {
                    AssignTarget::Ident(ident) => write!(f, "{}", ident.name())?,
                    AssignTarget::Index { object, index } => write!(f, "{object}[{index}]")?,
                }
                write!(f, " {} {value}", token.literal)
            }
        }
    }
}

/// A parsed source unit: the ordered top-level statements plus the source
/// text they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub source: std::sync::Arc<str>,
    pub file: Option<String>,
}
