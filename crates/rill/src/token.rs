use strum::Display as StrumDisplay;

/// A location in source text. Lines and columns are zero-based internally;
/// display code adds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    /// Byte offset into the source.
    pub offset: u32,
}

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
pub enum TokenType {
    Illegal,
    Eof,
    Newline,

    Ident,
    Int,
    Float,
    /// A double-quoted string with escapes processed.
    Str,
    /// A backtick-delimited raw string.
    Backtick,
    /// A single-quoted template string; `{expr}` fragments are split out by
    /// the parser.
    Template,

    // keywords
    Var,
    Const,
    Func,
    If,
    Else,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Import,
    From,
    As,
    Range,
    In,
    Defer,
    Go,
    Nil,
    True,
    False,

    // operators and punctuation
    Assign,
    Declare,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Power,
    Bang,
    Eq,
    NotEq,
    Lt,
    LtEquals,
    Gt,
    GtEquals,
    LtLt,
    GtGt,
    PlusEquals,
    MinusEquals,
    AsteriskEquals,
    SlashEquals,
    And,
    Or,
    Pipe,
    Send,
    PlusPlus,
    MinusMinus,
    Question,
    Colon,
    Semicolon,
    Comma,
    Period,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

impl TokenType {
    /// Maps an identifier-shaped word to its keyword type, if it is one.
    #[must_use]
    pub fn lookup_keyword(word: &str) -> Option<Self> {
        let ty = match word {
            "var" => Self::Var,
            "const" => Self::Const,
            "func" => Self::Func,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "switch" => Self::Switch,
            "case" => Self::Case,
            "default" => Self::Default,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "return" => Self::Return,
            "import" => Self::Import,
            "from" => Self::From,
            "as" => Self::As,
            "range" => Self::Range,
            "in" => Self::In,
            "defer" => Self::Defer,
            "go" => Self::Go,
            "nil" => Self::Nil,
            "true" => Self::True,
            "false" => Self::False,
            _ => return None,
        };
        Some(ty)
    }
}

/// One lexed token: kind, literal text, and its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenType,
    pub literal: String,
    pub start: Position,
    pub end: Position,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenType, literal: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            kind,
            literal: literal.into(),
            start,
            end,
        }
    }

    /// The end-of-input marker, positioned at the end of the source.
    #[must_use]
    pub fn eof(at: Position) -> Self {
        Self::new(TokenType::Eof, "", at, at)
    }

    /// The one-based line this token starts on, as shown in diagnostics.
    #[must_use]
    pub fn display_line(&self) -> u32 {
        self.start.line + 1
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::eof(Position::default())
    }
}
