//! Pratt parser for rill source text.
//!
//! The parser consumes tokens lazily from a [`Lexer`] and produces a
//! [`Program`]. Parsing stops at the first error; diagnostics carry the file,
//! start/end positions, and the offending source line.


use crate::{
    ast::{
        AssignOp, AssignTarget, Block, Case, Expr, Ident, ImportItem, Program, Stmt, TemplatePart,
    },
    errors::{Error, RunResult, SourceSpan},
    lexer::Lexer,
    token::{Token, TokenType},
};

// Precedence order for operators, low to high.
const LOWEST: u8 = 1;
const PIPE: u8 = 2;
const COND: u8 = 3;
const ASSIGN: u8 = 4;
const DECLARE: u8 = 5;
const TERNARY: u8 = 6;
const EQUALS: u8 = 7;
const LESSGREATER: u8 = 8;
const SUM: u8 = 9;
const PRODUCT: u8 = 10;
const POWER: u8 = 11;
const MOD: u8 = 12;
const PREFIX: u8 = 13;
const CALL: u8 = 14;
const INDEX: u8 = 15;

fn precedence(kind: TokenType) -> u8 {
    match kind {
        TokenType::Question => TERNARY,
        TokenType::Assign => ASSIGN,
        TokenType::Declare => DECLARE,
        TokenType::Eq | TokenType::NotEq => EQUALS,
        TokenType::Lt | TokenType::LtEquals | TokenType::Gt | TokenType::GtEquals => LESSGREATER,
        TokenType::Plus | TokenType::PlusEquals | TokenType::Minus | TokenType::MinusEquals => SUM,
        TokenType::Slash
        | TokenType::SlashEquals
        | TokenType::Asterisk
        | TokenType::AsteriskEquals
        | TokenType::GtGt
        | TokenType::LtLt => PRODUCT,
        TokenType::Power => POWER,
        TokenType::Percent => MOD,
        TokenType::And | TokenType::Or => COND,
        TokenType::Pipe => PIPE,
        TokenType::LParen | TokenType::Send => CALL,
        TokenType::Period | TokenType::LBracket => INDEX,
        TokenType::In | TokenType::Range => PREFIX,
        _ => 0,
    }
}

fn is_statement_terminator(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Semicolon
            | TokenType::Newline
            | TokenType::RBrace
            | TokenType::Eof
            | TokenType::PlusPlus
            | TokenType::MinusMinus
    )
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenType::Eof => "end of input".to_owned(),
        TokenType::Newline => "newline".to_owned(),
        _ => format!("\"{}\"", token.literal),
    }
}

fn describe_type(kind: TokenType) -> &'static str {
    match kind {
        TokenType::Ident => "an identifier",
        TokenType::LParen => "\"(\"",
        TokenType::RParen => "\")\"",
        TokenType::LBrace => "\"{\"",
        TokenType::RBrace => "\"}\"",
        TokenType::LBracket => "\"[\"",
        TokenType::RBracket => "\"]\"",
        TokenType::Colon => "\":\"",
        TokenType::Semicolon => "\";\"",
        TokenType::Comma => "\",\"",
        TokenType::Assign => "\"=\"",
        TokenType::Import => "\"import\"",
        _ => "a token",
    }
}

/// Parse the provided input as rill source code and return the program. This
/// is the shorthand way to create a [`Lexer`] and [`Parser`] and call
/// [`Parser::parse`].
pub fn parse(input: &str) -> RunResult<Program> {
    Parser::new(Lexer::new(input))?.parse()
}

/// Like [`parse`], with a file name attached to diagnostics.
pub fn parse_file(input: &str, file: &str) -> RunResult<Program> {
    let mut lexer = Lexer::new(input);
    lexer.set_file(file);
    Parser::new(lexer)?.parse()
}

/// Pratt parser state. A parser should be used only once.
pub struct Parser {
    lexer: Lexer,
    prev: Token,
    cur: Token,
    peek: Token,
    /// Inside a ternary expression? Nested ternaries are illegal.
    tern: bool,
}

impl Parser {
    pub fn new(lexer: Lexer) -> RunResult<Self> {
        let mut parser = Self {
            lexer,
            prev: Token::default(),
            cur: Token::default(),
            peek: Token::default(),
            tern: false,
        };
        // Prime the token pump: cur = token[0], peek = token[1].
        parser.next_token()?;
        parser.next_token()?;
        Ok(parser)
    }

    fn next_token(&mut self) -> RunResult<()> {
        self.prev = std::mem::replace(&mut self.cur, std::mem::take(&mut self.peek));
        self.peek = self.lexer.next_token()?;
        Ok(())
    }

    fn cur_is(&self, kind: TokenType) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenType) -> bool {
        self.peek.kind == kind
    }

    fn peek_precedence(&self) -> u8 {
        precedence(self.peek.kind)
    }

    fn cur_precedence(&self) -> u8 {
        precedence(self.cur.kind)
    }

    fn eat_newlines(&mut self) -> RunResult<()> {
        while self.peek_is(TokenType::Newline) {
            self.next_token()?;
        }
        Ok(())
    }

    fn token_error(&self, token: &Token, message: impl Into<String>) -> Error {
        let span = SourceSpan {
            file: self.lexer.file().map(ToOwned::to_owned),
            start: token.start,
            end: token.end,
            line_text: self.lexer.line_text(token),
        };
        Error::syntax(message, span)
    }

    /// Advances past the peek token after checking its type, or errors.
    fn expect_peek(&mut self, context: &str, expected: TokenType) -> RunResult<()> {
        if self.peek_is(expected) {
            self.next_token()
        } else {
            Err(self.token_error(
                &self.peek.clone(),
                format!(
                    "unexpected {} while parsing {} (expected {})",
                    describe(&self.peek),
                    context,
                    describe_type(expected)
                ),
            ))
        }
    }

    /// Parse the program provided via the lexer.
    pub fn parse(mut self) -> RunResult<Program> {
        let mut statements = Vec::new();
        while !self.cur_is(TokenType::Eof) {
            if let Some(stmt) = self.parse_statement_strict()? {
                statements.push(stmt);
            }
            self.next_token()?;
        }
        Ok(Program {
            statements,
            source: self.lexer.source(),
            file: self.lexer.file().map(ToOwned::to_owned),
        })
    }

    fn parse_statement_strict(&mut self) -> RunResult<Option<Stmt>> {
        let Some(stmt) = self.parse_statement()? else {
            return Ok(None);
        };
        // The statement should end with a semicolon, or the next token
        // should be a statement terminator.
        if !self.cur_is(TokenType::Semicolon) && !is_statement_terminator(self.peek.kind) {
            return Err(self.token_error(
                &self.cur.clone(),
                format!("unexpected token \"{}\" following statement", self.peek.literal),
            ));
        }
        Ok(Some(stmt))
    }

    fn parse_statement(&mut self) -> RunResult<Option<Stmt>> {
        let stmt = match self.cur.kind {
            TokenType::Var => Some(self.parse_var()?),
            TokenType::Const => Some(self.parse_const()?),
            TokenType::Return => Some(self.parse_return()?),
            TokenType::Break => Some(Stmt::Break {
                token: self.cur.clone(),
            }),
            TokenType::Continue => Some(Stmt::Continue {
                token: self.cur.clone(),
            }),
            TokenType::Import => Some(self.parse_import()?),
            TokenType::From => Some(self.parse_from_import()?),
            TokenType::Defer => Some(self.parse_defer()?),
            TokenType::Go => Some(self.parse_go()?),
            TokenType::Newline => None,
            // `x` followed by `++` parses as an expression statement and
            // then a postfix statement picking up the previous token.
            TokenType::PlusPlus | TokenType::MinusMinus => Some(Stmt::Postfix {
                token: self.cur.clone(),
                name: Ident::new(self.prev.clone()),
                op: self.cur.kind,
            }),
            TokenType::Ident
                if self.peek_is(TokenType::Declare) || self.peek_is(TokenType::Comma) =>
            {
                Some(self.parse_declaration()?)
            }
            _ => Some(Stmt::Expr(self.parse_expression(LOWEST)?)),
        };
        // Consume a trailing semicolon if present.
        if self.peek_is(TokenType::Semicolon) {
            self.next_token()?;
        }
        Ok(stmt)
    }

    fn parse_var(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        self.expect_peek("var statement", TokenType::Ident)?;
        let mut idents = vec![Ident::new(self.cur.clone())];
        while self.peek_is(TokenType::Comma) {
            self.next_token()?;
            self.expect_peek("var statement", TokenType::Ident)?;
            idents.push(Ident::new(self.cur.clone()));
        }
        self.expect_peek("var statement", TokenType::Assign)?;
        self.next_token()?;
        let value = self.parse_assignment_value()?;
        if idents.len() > 1 {
            Ok(Stmt::MultiVar {
                token,
                names: idents,
                value,
                declares: true,
            })
        } else {
            Ok(Stmt::Var {
                token,
                name: idents.remove(0),
                value,
            })
        }
    }

    fn parse_declaration(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        let mut idents = vec![Ident::new(self.cur.clone())];
        while self.peek_is(TokenType::Comma) {
            self.next_token()?;
            self.expect_peek("declaration statement", TokenType::Ident)?;
            idents.push(Ident::new(self.cur.clone()));
        }
        let walrus = match self.peek.kind {
            TokenType::Assign => false,
            TokenType::Declare => true,
            _ => {
                self.expect_peek("declaration statement", TokenType::Assign)?;
                unreachable!("expect_peek errors on mismatch")
            }
        };
        self.next_token()?; // move to the assignment operator
        self.next_token()?; // move to the value
        let value = self.parse_assignment_value()?;
        if idents.len() > 1 {
            Ok(Stmt::MultiVar {
                token,
                names: idents,
                value,
                declares: walrus,
            })
        } else {
            // A single name only reaches here through the walrus form; the
            // comma path guarantees multiple names otherwise.
            Ok(Stmt::Var {
                token,
                name: idents.remove(0),
                value,
            })
        }
    }

    fn parse_const(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        self.expect_peek("const statement", TokenType::Ident)?;
        let name = Ident::new(self.cur.clone());
        self.expect_peek("const statement", TokenType::Assign)?;
        self.next_token()?;
        let value = self.parse_assignment_value()?;
        Ok(Stmt::Const { token, name, value })
    }

    /// Parses the right hand side of an assignment statement.
    fn parse_assignment_value(&mut self) -> RunResult<Expr> {
        if matches!(
            self.cur.kind,
            TokenType::Newline | TokenType::Semicolon | TokenType::Eof
        ) {
            return Err(self.token_error(&self.prev.clone(), "assignment is missing a value"));
        }
        self.parse_expression(LOWEST)
    }

    fn parse_return(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        if matches!(
            self.peek.kind,
            TokenType::Semicolon | TokenType::Newline | TokenType::RBrace | TokenType::Eof
        ) {
            return Ok(Stmt::Return { token, value: None });
        }
        self.next_token()?;
        let value = self.parse_expression(LOWEST)?;
        Ok(Stmt::Return {
            token,
            value: Some(value),
        })
    }

    fn parse_import(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        self.expect_peek("an import statement", TokenType::Ident)?;
        let name = Ident::new(self.cur.clone());
        let mut alias = None;
        if self.peek_is(TokenType::As) {
            self.next_token()?;
            self.expect_peek("an import statement", TokenType::Ident)?;
            alias = Some(Ident::new(self.cur.clone()));
        }
        Ok(Stmt::Import { token, name, alias })
    }

    fn parse_from_import(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        self.expect_peek("a from-import statement", TokenType::Ident)?;
        let mut path = Vec::new();
        while self.cur_is(TokenType::Ident) {
            path.push(Ident::new(self.cur.clone()));
            self.next_token()?;
            if !self.cur_is(TokenType::Period) {
                break;
            }
            self.next_token()?;
        }
        if !self.cur_is(TokenType::Import) {
            return Err(
                self.token_error(&self.prev.clone(), "from-import is missing import statement")
            );
        }
        // If the imports are surrounded by parentheses, we are in a grouped
        // import which may span multiple lines.
        let grouped = self.peek_is(TokenType::LParen);
        if grouped {
            self.next_token()?;
            self.eat_newlines()?;
        }
        self.expect_peek("a from-import statement", TokenType::Ident)?;
        let mut imports = Vec::new();
        loop {
            let name = Ident::new(self.cur.clone());
            let mut alias = None;
            if self.peek_is(TokenType::As) {
                self.next_token()?;
                self.expect_peek("a from-import statement", TokenType::Ident)?;
                alias = Some(Ident::new(self.cur.clone()));
            }
            imports.push(ImportItem { name, alias });
            if self.peek_is(TokenType::Comma) {
                self.next_token()?;
                if grouped {
                    self.eat_newlines()?;
                    if self.peek_is(TokenType::RParen) {
                        break;
                    }
                }
                self.expect_peek("a from-import statement", TokenType::Ident)?;
            } else {
                break;
            }
        }
        if grouped {
            self.eat_newlines()?;
            self.expect_peek("a from-import statement", TokenType::RParen)?;
        }
        Ok(Stmt::FromImport { token, path, imports })
    }

    fn parse_go(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        self.next_token()?;
        if !self.cur_is(TokenType::Func) && !self.cur_is(TokenType::Ident) {
            return Err(self.token_error(&self.cur.clone(), "invalid go statement"));
        }
        let expr = self.parse_expression(PREFIX)?;
        match expr {
            Expr::Call { .. } => Ok(Stmt::Go { token, call: expr }),
            _ => Err(self.token_error(&self.cur.clone(), "invalid go statement")),
        }
    }

    fn parse_defer(&mut self) -> RunResult<Stmt> {
        let token = self.cur.clone();
        self.next_token()?;
        if !self.cur_is(TokenType::Func) && !self.cur_is(TokenType::Ident) {
            return Err(self.token_error(&self.cur.clone(), "invalid defer statement"));
        }
        let expr = self.parse_expression(PREFIX)?;
        match expr {
            Expr::Call { .. } => Ok(Stmt::Defer { token, call: expr }),
            _ => Err(self.token_error(&self.cur.clone(), "invalid defer statement")),
        }
    }

    fn parse_expression(&mut self, precedence: u8) -> RunResult<Expr> {
        while self.cur_is(TokenType::Newline) {
            self.next_token()?;
        }
        let mut left = self.parse_prefix()?;
        while !self.peek_is(TokenType::Semicolon) && precedence < self.peek_precedence() {
            if !has_infix(self.peek.kind) {
                return Ok(left);
            }
            self.next_token()?;
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> RunResult<Expr> {
        match self.cur.kind {
            TokenType::Ident => {
                if self.cur.literal.is_empty() {
                    return Err(self.token_error(&self.cur.clone(), "invalid identifier"));
                }
                Ok(Expr::Ident(Ident::new(self.cur.clone())))
            }
            TokenType::Int => self.parse_int(),
            TokenType::Float => self.parse_float(),
            TokenType::Str | TokenType::Backtick => Ok(Expr::Str {
                token: self.cur.clone(),
                value: self.cur.literal.clone(),
            }),
            TokenType::Template => self.parse_template(),
            TokenType::True | TokenType::False => Ok(Expr::Bool {
                token: self.cur.clone(),
                value: self.cur_is(TokenType::True),
            }),
            TokenType::Nil => Ok(Expr::Nil {
                token: self.cur.clone(),
            }),
            TokenType::Bang | TokenType::Minus => {
                let token = self.cur.clone();
                self.next_token()?;
                let right = self.parse_expression(PREFIX)?;
                Ok(Expr::Prefix {
                    op: token.kind,
                    token,
                    right: Box::new(right),
                })
            }
            TokenType::LParen => {
                self.next_token()?;
                let expr = self.parse_expression(LOWEST)?;
                self.expect_peek("grouped expression", TokenType::RParen)?;
                Ok(expr)
            }
            TokenType::LBracket => {
                let token = self.cur.clone();
                let items = self.parse_expr_list(TokenType::RBracket)?;
                Ok(Expr::List { token, items })
            }
            TokenType::LBrace => self.parse_map_or_set(),
            TokenType::If => self.parse_if(),
            TokenType::For => self.parse_for(),
            TokenType::Switch => self.parse_switch(),
            TokenType::Func => self.parse_func(),
            TokenType::Range => self.parse_range(),
            TokenType::Send => {
                let token = self.cur.clone();
                self.next_token()?;
                let channel = self.parse_expression(PREFIX)?;
                Ok(Expr::Receive {
                    token,
                    channel: Box::new(channel),
                })
            }
            TokenType::Eof => Err(self.token_error(
                &self.cur.clone(),
                "invalid syntax (unexpected end of input)",
            )),
            TokenType::Illegal => Err(self.token_error(
                &self.cur.clone(),
                format!("illegal token {}", self.cur.literal),
            )),
            _ => Err(self.token_error(
                &self.cur.clone(),
                format!("invalid syntax (unexpected \"{}\")", self.cur.literal),
            )),
        }
    }

    fn parse_infix(&mut self, left: Expr) -> RunResult<Expr> {
        match self.cur.kind {
            TokenType::Plus
            | TokenType::Minus
            | TokenType::Asterisk
            | TokenType::Slash
            | TokenType::Percent
            | TokenType::Power
            | TokenType::LtLt
            | TokenType::GtGt
            | TokenType::Eq
            | TokenType::NotEq
            | TokenType::Lt
            | TokenType::LtEquals
            | TokenType::Gt
            | TokenType::GtEquals
            | TokenType::And
            | TokenType::Or => self.parse_infix_expr(left),
            TokenType::Assign
            | TokenType::Declare
            | TokenType::PlusEquals
            | TokenType::MinusEquals
            | TokenType::AsteriskEquals
            | TokenType::SlashEquals => self.parse_assign(left),
            TokenType::LParen => self.parse_call(left),
            TokenType::LBracket => self.parse_index(left),
            TokenType::Period => self.parse_getattr(left),
            TokenType::Pipe => self.parse_pipe(left),
            TokenType::Question => self.parse_ternary(left),
            TokenType::Send => self.parse_send(left),
            TokenType::In => self.parse_in(left),
            _ => Err(self.token_error(&self.cur.clone(), "invalid expression")),
        }
    }

    fn parse_int(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        let lit = token.literal.as_str();
        let parsed = if let Some(hex) = lit.strip_prefix("0x").or_else(|| lit.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16)
        } else if lit.len() > 1 && lit.starts_with('0') {
            i64::from_str_radix(&lit[1..], 8)
        } else {
            lit.parse::<i64>()
        };
        match parsed {
            Ok(value) => Ok(Expr::Int { token, value }),
            Err(_) => Err(self.token_error(&token, format!("invalid integer: {lit}"))),
        }
    }

    fn parse_float(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        match token.literal.parse::<f64>() {
            Ok(value) => Ok(Expr::Float { token, value }),
            Err(_) => Err(self.token_error(&token, format!("invalid float: {}", token.literal))),
        }
    }

    fn parse_template(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = token.literal.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '{' {
                literal.push(ch);
                continue;
            }
            if !literal.is_empty() {
                parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
            }
            let mut fragment = String::new();
            let mut depth = 1usize;
            loop {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        fragment.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        fragment.push('}');
                    }
                    Some(c) => fragment.push(c),
                    None => {
                        return Err(
                            self.token_error(&token, "unterminated template expression")
                        );
                    }
                }
            }
            parts.push(self.parse_template_fragment(&token, &fragment)?);
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Expr::Template { token, parts })
    }

    /// Template fragments are re-entered through the full parser; a fragment
    /// may contain at most one expression statement.
    fn parse_template_fragment(&mut self, token: &Token, fragment: &str) -> RunResult<TemplatePart> {
        let program = match parse(fragment) {
            Ok(program) => program,
            // re-anchor the fragment's error to the template token
            Err(err) => return Err(self.token_error(token, err.message().to_owned())),
        };
        let mut statements = program.statements;
        match statements.len() {
            0 => Ok(TemplatePart::Expr(None)),
            1 => match statements.remove(0) {
                Stmt::Expr(expr) => Ok(TemplatePart::Expr(Some(Box::new(expr)))),
                _ => Err(self.token_error(token, "template contains an unexpected statement type")),
            },
            _ => Err(self.token_error(token, "template contains more than one expression")),
        }
    }

    fn parse_if(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.next_token()?; // move past the "if"
        let cond = self.parse_expression(LOWEST)?;
        self.expect_peek("an if expression", TokenType::LBrace)?;
        let consequence = self.parse_block()?;
        let mut alternative = None;
        if self.peek_is(TokenType::Else) {
            self.next_token()?; // move to the "else"
            if self.peek_is(TokenType::If) {
                // This is an "else if"; handled recursively.
                self.next_token()?;
                let nested_token = self.cur.clone();
                let nested = self.parse_if()?;
                let block = Block {
                    token: nested_token,
                    statements: vec![Stmt::Expr(nested)],
                };
                return Ok(Expr::If {
                    token,
                    cond: Box::new(cond),
                    consequence,
                    alternative: Some(block),
                });
            }
            self.expect_peek("an if expression", TokenType::LBrace)?;
            alternative = Some(self.parse_block()?);
        }
        Ok(Expr::If {
            token,
            cond: Box::new(cond),
            consequence,
            alternative,
        })
    }

    fn parse_for(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.next_token()?; // move past "for"

        // Simple form: "for { ... }"
        if self.cur_is(TokenType::LBrace) {
            let body = self.parse_block()?;
            return Ok(Expr::For {
                token,
                init: None,
                cond: None,
                post: None,
                body,
            });
        }

        let mut init = None;
        if !self.cur_is(TokenType::Semicolon) {
            init = self.parse_statement()?;
            if init.is_none() {
                return Err(self.token_error(&self.cur.clone(), "invalid for loop expression"));
            }
        }

        // Condition-only and range forms: "for <init> { ... }"
        if self.peek_is(TokenType::LBrace) {
            self.next_token()?;
            let body = self.parse_block()?;
            return match init {
                Some(Stmt::Var { name, value, .. }) if matches!(value, Expr::Range { .. }) => {
                    let Expr::Range { container, .. } = value else {
                        unreachable!("matched range above")
                    };
                    Ok(Expr::ForRange {
                        token,
                        vars: vec![name],
                        iterable: container,
                        body,
                    })
                }
                Some(Stmt::MultiVar { names, value, .. })
                    if matches!(value, Expr::Range { .. }) =>
                {
                    let Expr::Range { container, .. } = value else {
                        unreachable!("matched range above")
                    };
                    Ok(Expr::ForRange {
                        token,
                        vars: names,
                        iterable: container,
                        body,
                    })
                }
                Some(Stmt::Expr(cond)) => Ok(Expr::For {
                    token,
                    init: None,
                    cond: Some(Box::new(cond)),
                    post: None,
                    body,
                }),
                _ => Err(self.token_error(&token, "invalid for loop condition")),
            };
        }

        // Three-part form.
        if !self.cur_is(TokenType::Semicolon) {
            return Err(self.token_error(
                &self.cur.clone(),
                "expected semicolon after for loop initialization",
            ));
        }
        self.next_token()?; // move past the first semicolon

        let mut cond = None;
        if !self.cur_is(TokenType::Semicolon) {
            cond = Some(Box::new(self.parse_expression(LOWEST)?));
            self.expect_peek("for loop", TokenType::Semicolon)?;
        }
        self.next_token()?; // move past the second semicolon

        let mut post = None;
        if !self.cur_is(TokenType::LBrace) {
            if self.cur_is(TokenType::Ident)
                && (self.peek_is(TokenType::PlusPlus) || self.peek_is(TokenType::MinusMinus))
            {
                let name = Ident::new(self.cur.clone());
                self.next_token()?;
                post = Some(Box::new(Stmt::Postfix {
                    token: self.cur.clone(),
                    name,
                    op: self.cur.kind,
                }));
            } else {
                let stmt = self.parse_statement()?;
                match stmt {
                    Some(stmt) => post = Some(Box::new(stmt)),
                    None => {
                        return Err(self.token_error(
                            &self.cur.clone(),
                            "invalid for loop post statement",
                        ));
                    }
                }
            }
        }

        self.expect_peek("for loop", TokenType::LBrace)?;
        let body = self.parse_block()?;
        Ok(Expr::For {
            token,
            init: init.map(Box::new),
            cond,
            post,
            body,
        })
    }

    fn parse_block(&mut self) -> RunResult<Block> {
        let token = self.cur.clone(); // should be '{'
        self.next_token()?; // move past the '{'
        let mut statements = Vec::new();
        while !self.cur_is(TokenType::RBrace) && !self.cur_is(TokenType::Eof) {
            if let Some(stmt) = self.parse_statement_strict()? {
                statements.push(stmt);
            }
            self.next_token()?;
        }
        if self.cur_is(TokenType::Eof) {
            return Err(self.token_error(&token, "unterminated block statement"));
        }
        Ok(Block { token, statements })
    }

    fn parse_func(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        let mut name = None;
        if self.peek_is(TokenType::Ident) {
            self.next_token()?;
            name = Some(Ident::new(self.cur.clone()));
        }
        self.expect_peek("function", TokenType::LParen)?;
        let (params, defaults) = self.parse_func_params()?;
        self.expect_peek("function", TokenType::LBrace)?;
        let body = self.parse_block()?;
        Ok(Expr::Func {
            token,
            name,
            params,
            defaults,
            body,
        })
    }

    fn parse_func_params(&mut self) -> RunResult<(Vec<Ident>, Vec<Option<Expr>>)> {
        let mut params = Vec::new();
        let mut defaults = Vec::new();
        if self.peek_is(TokenType::RParen) {
            self.next_token()?;
            return Ok((params, defaults));
        }
        self.next_token()?;
        while !self.cur_is(TokenType::RParen) {
            if self.cur_is(TokenType::Eof) {
                return Err(
                    self.token_error(&self.prev.clone(), "unterminated function parameters")
                );
            }
            if !self.cur_is(TokenType::Ident) {
                return Err(self.token_error(
                    &self.cur.clone(),
                    format!("expected an identifier (got {})", self.cur.literal),
                ));
            }
            params.push(Ident::new(self.cur.clone()));
            defaults.push(None);
            self.next_token()?;
            // If there is "=expr" after the name then expr is a default value.
            if self.cur_is(TokenType::Assign) {
                self.next_token()?;
                let expr = self.parse_expression(LOWEST)?;
                if let Some(slot) = defaults.last_mut() {
                    *slot = Some(expr);
                }
                self.next_token()?;
            }
            if self.cur_is(TokenType::Comma) {
                self.next_token()?;
            }
        }
        Ok((params, defaults))
    }

    fn parse_switch(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.next_token()?;
        let value = self.parse_expression(LOWEST)?;
        self.expect_peek("switch statement", TokenType::LBrace)?;
        self.next_token()?;
        while self.cur_is(TokenType::Newline) {
            self.next_token()?;
        }
        let mut cases: Vec<Case> = Vec::new();
        let mut default_count = 0;
        while !self.cur_is(TokenType::RBrace) {
            if self.cur_is(TokenType::Eof) {
                return Err(self.token_error(&self.prev.clone(), "unterminated switch statement"));
            }
            let case_token = self.cur.clone();
            let exprs = match self.cur.kind {
                TokenType::Default => None,
                TokenType::Case => {
                    self.next_token()?; // move past "case"
                    let mut exprs = vec![self.parse_expression(LOWEST)?];
                    while self.peek_is(TokenType::Comma) {
                        self.next_token()?; // move to the comma
                        self.next_token()?; // move to the following expression
                        exprs.push(self.parse_expression(LOWEST)?);
                    }
                    Some(exprs)
                }
                _ => {
                    return Err(self.token_error(
                        &self.cur.clone(),
                        format!("expected 'case' or 'default' (got {})", self.cur.literal),
                    ));
                }
            };
            if exprs.is_none() {
                default_count += 1;
                if default_count > 1 {
                    return Err(self.token_error(
                        &case_token,
                        "switch statement has multiple default blocks",
                    ));
                }
            }
            self.expect_peek("switch statement", TokenType::Colon)?;
            self.next_token()?;
            while self.cur_is(TokenType::Newline) {
                self.next_token()?;
            }
            // An empty case statement is valid.
            if self.cur_is(TokenType::Case)
                || self.cur_is(TokenType::Default)
                || self.cur_is(TokenType::RBrace)
            {
                cases.push(Case {
                    token: case_token,
                    exprs,
                    body: Block {
                        token: self.cur.clone(),
                        statements: Vec::new(),
                    },
                });
                continue;
            }
            let block_token = self.cur.clone();
            let mut statements = Vec::new();
            loop {
                while self.cur_is(TokenType::Newline) || self.cur_is(TokenType::Semicolon) {
                    self.next_token()?;
                }
                if self.cur_is(TokenType::Case)
                    || self.cur_is(TokenType::Default)
                    || self.cur_is(TokenType::RBrace)
                    || self.cur_is(TokenType::Eof)
                {
                    break;
                }
                if let Some(stmt) = self.parse_statement()? {
                    statements.push(stmt);
                }
                if !self.cur_is(TokenType::Semicolon)
                    && !is_statement_terminator(self.peek.kind)
                    && !self.peek_is(TokenType::Case)
                    && !self.peek_is(TokenType::Default)
                    && !self.peek_is(TokenType::RBrace)
                {
                    return Err(self.token_error(
                        &self.peek.clone(),
                        format!(
                            "unexpected {} while parsing case statement (expected \";\")",
                            describe(&self.peek)
                        ),
                    ));
                }
                self.next_token()?;
            }
            cases.push(Case {
                token: case_token,
                exprs,
                body: Block {
                    token: block_token,
                    statements,
                },
            });
        }
        Ok(Expr::Switch {
            token,
            value: Box::new(value),
            cases,
        })
    }

    fn parse_range(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.next_token()?;
        if self.cur_is(TokenType::LBrace) {
            return Err(self.token_error(
                &self.cur.clone(),
                "invalid range expression (unexpected \"{\")",
            ));
        }
        let container = self.parse_expression(PREFIX)?;
        Ok(Expr::Range {
            token,
            container: Box::new(container),
        })
    }

    fn parse_map_or_set(&mut self) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.eat_newlines()?;
        // Empty {} turns into an empty map (not a set).
        if self.peek_is(TokenType::RBrace) {
            self.next_token()?;
            return Ok(Expr::Map {
                token,
                pairs: Vec::new(),
            });
        }
        self.next_token()?; // move to the first key
        let first = self.parse_expression(LOWEST)?;
        if self.peek_is(TokenType::Colon) {
            // This is a map.
            self.next_token()?; // move to the ":"
            self.next_token()?; // move to the first value
            let value = self.parse_expression(LOWEST)?;
            let mut pairs = vec![(first, value)];
            loop {
                self.eat_newlines()?;
                if self.peek_is(TokenType::RBrace) {
                    self.next_token()?;
                    break;
                }
                self.expect_peek("map", TokenType::Comma)?;
                self.eat_newlines()?;
                if self.peek_is(TokenType::RBrace) {
                    self.next_token()?;
                    break;
                }
                self.next_token()?;
                let key = self.parse_expression(LOWEST)?;
                self.expect_peek("map", TokenType::Colon)?;
                self.next_token()?;
                let value = self.parse_expression(LOWEST)?;
                pairs.push((key, value));
            }
            Ok(Expr::Map { token, pairs })
        } else {
            // This is a set.
            let mut items = vec![first];
            loop {
                self.eat_newlines()?;
                if self.peek_is(TokenType::RBrace) {
                    self.next_token()?;
                    break;
                }
                self.expect_peek("set", TokenType::Comma)?;
                self.eat_newlines()?;
                if self.peek_is(TokenType::RBrace) {
                    self.next_token()?;
                    break;
                }
                self.next_token()?;
                items.push(self.parse_expression(LOWEST)?);
            }
            Ok(Expr::Set { token, items })
        }
    }

    fn parse_expr_list(&mut self, end: TokenType) -> RunResult<Vec<Expr>> {
        let mut list = Vec::new();
        if self.peek_is(end) {
            self.next_token()?;
            return Ok(list);
        }
        self.eat_newlines()?;
        self.next_token()?;
        list.push(self.parse_expression(LOWEST)?);
        while self.peek_is(TokenType::Comma) {
            // move to the comma
            self.next_token()?;
            // advance across any extra newlines
            self.eat_newlines()?;
            // check if the list has ended after the newlines
            if self.peek_is(end) {
                break;
            }
            // move to the next expression
            self.next_token()?;
            list.push(self.parse_expression(LOWEST)?);
        }
        self.eat_newlines()?;
        self.expect_peek("an expression list", end)?;
        Ok(list)
    }

    fn parse_infix_expr(&mut self, left: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        let precedence = self.cur_precedence();
        self.next_token()?;
        while self.cur_is(TokenType::Newline) {
            self.next_token()?;
        }
        let right = self.parse_expression(precedence)?;
        Ok(Expr::Infix {
            op: token.kind,
            token,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_ternary(&mut self, cond: Expr) -> RunResult<Expr> {
        if self.tern {
            return Err(self.token_error(&self.cur.clone(), "nested ternary expression detected"));
        }
        self.tern = true;
        let token = self.cur.clone(); // the "?"
        let precedence = self.cur_precedence();
        self.next_token()?; // move past the '?'
        let if_true = self.parse_expression(precedence)?;
        self.expect_peek("ternary expression", TokenType::Colon)?;
        self.next_token()?; // move past the ':'
        let if_false = self.parse_expression(precedence)?;
        self.tern = false;
        Ok(Expr::Ternary {
            token,
            cond: Box::new(cond),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }

    fn parse_assign(&mut self, left: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        let target = match left {
            Expr::Ident(ident) => AssignTarget::Ident(ident),
            Expr::Index { object, index, .. } => AssignTarget::Index { object, index },
            other => {
                return Err(self.token_error(
                    &token,
                    format!("unexpected token for assignment: {}", other.token().literal),
                ));
            }
        };
        let op = match token.kind {
            TokenType::Assign => AssignOp::Assign,
            TokenType::Declare => AssignOp::Declare,
            TokenType::PlusEquals => AssignOp::Add,
            TokenType::MinusEquals => AssignOp::Sub,
            TokenType::AsteriskEquals => AssignOp::Mul,
            TokenType::SlashEquals => AssignOp::Div,
            _ => {
                return Err(self.token_error(
                    &token,
                    format!("unsupported operator for assignment: {}", token.literal),
                ));
            }
        };
        self.next_token()?; // move to the RHS value
        let value = self.parse_expression(LOWEST)?;
        Ok(Expr::Assign {
            token,
            target,
            op,
            value: Box::new(value),
        })
    }

    fn parse_call(&mut self, function: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        let args = self.parse_expr_list(TokenType::RParen)?;
        Ok(Expr::Call {
            token,
            function: Box::new(function),
            args,
        })
    }

    fn parse_getattr(&mut self, object: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.expect_peek("an attribute access", TokenType::Ident)?;
        Ok(Expr::GetAttr {
            token,
            object: Box::new(object),
            name: Ident::new(self.cur.clone()),
        })
    }

    fn parse_index(&mut self, object: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        let mut first = None;
        if !self.peek_is(TokenType::Colon) {
            self.next_token()?; // move to the first index
            first = Some(self.parse_expression(LOWEST)?);
            if self.peek_is(TokenType::RBracket) {
                self.next_token()?; // move to the "]"
                let Some(index) = first else {
                    return Err(self.token_error(&token, "invalid index expression"));
                };
                return Ok(Expr::Index {
                    token,
                    object: Box::new(object),
                    index: Box::new(index),
                });
            }
        }
        let mut second = None;
        if self.peek_is(TokenType::Colon) {
            self.next_token()?; // move to the ":"
            if self.peek_is(TokenType::RBracket) {
                self.next_token()?; // move to the "]"
                return Ok(Expr::Slice {
                    token,
                    object: Box::new(object),
                    start: first.map(Box::new),
                    stop: None,
                });
            }
            self.next_token()?; // move to the second index
            second = Some(self.parse_expression(LOWEST)?);
        }
        self.expect_peek("an index expression", TokenType::RBracket)?;
        Ok(Expr::Slice {
            token,
            object: Box::new(object),
            start: first.map(Box::new),
            stop: second.map(Box::new),
        })
    }

    fn parse_pipe(&mut self, first: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        let mut stages = vec![first];
        loop {
            // Move past the pipe operator itself; parse_expression skips any
            // newlines that follow it.
            self.next_token()?;
            stages.push(self.parse_expression(PIPE)?);
            if self.peek_is(TokenType::Pipe) {
                self.next_token()?; // move to the next "|"
            } else {
                break;
            }
        }
        Ok(Expr::Pipe { token, stages })
    }

    fn parse_send(&mut self, channel: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.next_token()?;
        let value = self.parse_expression(LOWEST)?;
        Ok(Expr::Send {
            token,
            channel: Box::new(channel),
            value: Box::new(value),
        })
    }

    fn parse_in(&mut self, item: Expr) -> RunResult<Expr> {
        let token = self.cur.clone();
        self.next_token()?;
        let container = self.parse_expression(PREFIX)?;
        Ok(Expr::In {
            token,
            item: Box::new(item),
            container: Box::new(container),
        })
    }
}

fn has_infix(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Plus
            | TokenType::Minus
            | TokenType::Asterisk
            | TokenType::Slash
            | TokenType::Percent
            | TokenType::Power
            | TokenType::LtLt
            | TokenType::GtGt
            | TokenType::Eq
            | TokenType::NotEq
            | TokenType::Lt
            | TokenType::LtEquals
            | TokenType::Gt
            | TokenType::GtEquals
            | TokenType::And
            | TokenType::Or
            | TokenType::Assign
            | TokenType::Declare
            | TokenType::PlusEquals
            | TokenType::MinusEquals
            | TokenType::AsteriskEquals
            | TokenType::SlashEquals
            | TokenType::LParen
            | TokenType::LBracket
            | TokenType::Period
            | TokenType::Pipe
            | TokenType::Question
            | TokenType::Send
            | TokenType::In
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_one(source: &str) -> Stmt {
        let mut program = parse(source).expect("parse");
        assert_eq!(program.statements.len(), 1, "expected one statement");
        program.statements.remove(0)
    }

    #[test]
    fn parses_arithmetic_with_precedence() {
        let stmt = parse_one("1 + 2 * 3");
        let Stmt::Expr(Expr::Infix { op, right, .. }) = stmt else {
            panic!("expected infix");
        };
        assert_eq!(op, TokenType::Plus);
        assert!(matches!(*right, Expr::Infix { op: TokenType::Asterisk, .. }));
    }

    #[test]
    fn parses_walrus_declaration() {
        let stmt = parse_one("x := 41");
        assert!(matches!(stmt, Stmt::Var { ref name, .. } if name.name() == "x"));
    }

    #[test]
    fn parses_multi_declaration() {
        let stmt = parse_one("a, b := [1, 2]");
        let Stmt::MultiVar { names, declares, .. } = stmt else {
            panic!("expected multi var");
        };
        assert_eq!(names.len(), 2);
        assert!(declares);
    }

    #[test]
    fn parses_function_with_defaults() {
        let stmt = parse_one("func add(a, b=2) { a + b }");
        let Stmt::Expr(Expr::Func { params, defaults, name, .. }) = stmt else {
            panic!("expected func");
        };
        assert_eq!(name.expect("named").name(), "add");
        assert_eq!(params.len(), 2);
        assert!(defaults[0].is_none());
        assert!(defaults[1].is_some());
    }

    #[test]
    fn parses_for_range_two_vars() {
        let stmt = parse_one("for i, v := range [1, 2] { v }");
        let Stmt::Expr(Expr::ForRange { vars, .. }) = stmt else {
            panic!("expected range loop");
        };
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn parses_three_part_for() {
        let stmt = parse_one("for i := 0; i < 3; i++ { i }");
        let Stmt::Expr(Expr::For { init, cond, post, .. }) = stmt else {
            panic!("expected for loop");
        };
        assert!(init.is_some());
        assert!(cond.is_some());
        assert!(matches!(post.as_deref(), Some(Stmt::Postfix { .. })));
    }

    #[test]
    fn parses_pipe_chain() {
        let stmt = parse_one("x | f | g");
        let Stmt::Expr(Expr::Pipe { stages, .. }) = stmt else {
            panic!("expected pipe");
        };
        assert_eq!(stages.len(), 3);
    }

    #[test]
    fn parses_send_and_receive() {
        let stmt = parse_one("c <- 1");
        assert!(matches!(stmt, Stmt::Expr(Expr::Send { .. })));
        let stmt = parse_one("x := <-c");
        let Stmt::Var { value, .. } = stmt else {
            panic!("expected declaration");
        };
        assert!(matches!(value, Expr::Receive { .. }));
    }

    #[test]
    fn rejects_nested_ternary() {
        let err = parse("a ? b ? c : d : e").expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "syntax error: nested ternary expression detected"
        );
    }

    #[test]
    fn rejects_defer_of_non_call() {
        let err = parse("defer x").expect_err("should fail");
        assert_eq!(err.to_string(), "syntax error: invalid defer statement");
    }

    #[test]
    fn rejects_go_of_non_call() {
        let err = parse("go 1 + 2").expect_err("should fail");
        assert_eq!(err.to_string(), "syntax error: invalid go statement");
    }

    #[test]
    fn template_with_multiple_expressions_fails() {
        let err = parse("'{a; b}'").expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "syntax error: template contains more than one expression"
        );
    }

    #[test]
    fn parses_template_fragments() {
        let stmt = parse_one("'sum: {1 + 2}!'");
        let Stmt::Expr(Expr::Template { parts, .. }) = stmt else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], TemplatePart::Literal(s) if s == "sum: "));
        assert!(matches!(&parts[1], TemplatePart::Expr(Some(_))));
        assert!(matches!(&parts[2], TemplatePart::Literal(s) if s == "!"));
    }

    #[test]
    fn parses_grouped_from_import() {
        let program = parse("from a.b import (\n  x,\n  y as z,\n)").expect("parse");
        let Stmt::FromImport { path, imports, .. } = &program.statements[0] else {
            panic!("expected from-import");
        };
        assert_eq!(path.len(), 2);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[1].alias.as_ref().expect("alias").name(), "z");
    }

    #[test]
    fn parses_switch_with_multi_value_case() {
        let stmt = parse_one("switch x {\ncase 1, 2:\n  a\ndefault:\n  b\n}");
        let Stmt::Expr(Expr::Switch { cases, .. }) = stmt else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].exprs.as_ref().expect("case exprs").len(), 2);
        assert!(cases[1].exprs.is_none());
    }

    #[test]
    fn reports_unterminated_block() {
        let err = parse("if true { 1").expect_err("should fail");
        assert_eq!(err.to_string(), "syntax error: unterminated block statement");
    }

    #[test]
    fn slice_forms() {
        assert!(matches!(
            parse_one("x[1:2]"),
            Stmt::Expr(Expr::Slice { start: Some(_), stop: Some(_), .. })
        ));
        assert!(matches!(
            parse_one("x[:2]"),
            Stmt::Expr(Expr::Slice { start: None, stop: Some(_), .. })
        ));
        assert!(matches!(
            parse_one("x[1:]"),
            Stmt::Expr(Expr::Slice { start: Some(_), stop: None, .. })
        ));
        assert!(matches!(parse_one("x[1]"), Stmt::Expr(Expr::Index { .. })));
    }

    #[test]
    fn postfix_statement_uses_previous_ident() {
        let program = parse("x := 1; x++").expect("parse");
        assert!(matches!(
            program.statements.last(),
            Some(Stmt::Postfix { name, op: TokenType::PlusPlus, .. }) if name.name() == "x"
        ));
    }
}
