use std::sync::Arc;

use crate::{
    errors::{Error, RunResult, SourceSpan},
    token::{Position, Token, TokenType},
};

/// Converts source text into a stream of tokens.
///
/// The lexer is lazy: call [`Lexer::next_token`] repeatedly until it returns a
/// token of type [`TokenType::Eof`]. Lexer errors are terminal for the source
/// unit; the parser surfaces them as syntax errors and refuses to continue.
#[derive(Debug)]
pub struct Lexer {
    source: Arc<str>,
    file: Option<String>,
    /// Byte offset of the next unread character.
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self {
            source: Arc::from(source),
            file: None,
            pos: 0,
            line: 0,
            column: 0,
        }
    }

    pub fn set_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
    }

    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// The full text of the line a token starts on, used in diagnostics.
    #[must_use]
    pub fn line_text(&self, token: &Token) -> String {
        let offset = (token.start.offset as usize).min(self.source.len());
        let start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = self.source[offset..]
            .find('\n')
            .map_or(self.source.len(), |i| offset + i);
        self.source[start..end].to_owned()
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos as u32,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, start: Position) -> Error {
        let span = SourceSpan {
            file: self.file.clone(),
            start,
            end: self.position(),
            line_text: self.line_text(&Token::new(TokenType::Illegal, "", start, start)),
        };
        Error::syntax(message, span)
    }

    /// Returns the next token, or an error that is terminal for this source.
    pub fn next_token(&mut self) -> RunResult<Token> {
        self.skip_non_newline_trivia();
        let start = self.position();
        let Some(ch) = self.peek() else {
            return Ok(Token::eof(start));
        };
        match ch {
            '\n' => {
                self.bump();
                Ok(self.finish(TokenType::Newline, "\n", start))
            }
            '"' => self.read_string(start),
            '`' => self.read_backtick(start),
            '\'' => self.read_template(start),
            c if c.is_ascii_digit() => Ok(self.read_number(start)),
            c if is_ident_start(c) => Ok(self.read_ident(start)),
            _ => self.read_operator(start),
        }
    }

    fn skip_non_newline_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() && c != '\n' => {
                    self.bump();
                }
                Some('#') => self.skip_line_comment(),
                Some('/') if self.peek_second() == Some('/') => self.skip_line_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn finish(&self, kind: TokenType, literal: impl Into<String>, start: Position) -> Token {
        Token::new(kind, literal, start, self.position())
    }

    fn read_ident(&mut self, start: Position) -> Token {
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.source[start.offset as usize..self.pos];
        let kind = TokenType::lookup_keyword(literal).unwrap_or(TokenType::Ident);
        Token::new(kind, literal, start, self.position())
    }

    fn read_number(&mut self, start: Position) -> Token {
        // hex literals keep their 0x prefix; the parser decodes the value
        if self.peek() == Some('0') && matches!(self.peek_second(), Some('x' | 'X')) {
            self.bump();
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    self.bump();
                } else {
                    break;
                }
            }
            let literal = &self.source[start.offset as usize..self.pos];
            return Token::new(TokenType::Int, literal, start, self.position());
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    self.bump();
                }
                // a period starts a fraction only when a digit follows;
                // otherwise it belongs to an attribute access like 1.string()
                '.' if !is_float && self.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                    is_float = true;
                    self.bump();
                }
                'e' | 'E' if self.peek_second().is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-') => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('+' | '-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let literal = &self.source[start.offset as usize..self.pos];
        let kind = if is_float { TokenType::Float } else { TokenType::Int };
        Token::new(kind, literal, start, self.position())
    }

    fn read_string(&mut self, start: Position) -> RunResult<Token> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal", start)),
                Some('"') => break,
                Some('\\') => value.push(self.read_escape(start)?),
                Some(c) => value.push(c),
            }
        }
        Ok(self.finish(TokenType::Str, value, start))
    }

    fn read_backtick(&mut self, start: Position) -> RunResult<Token> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal", start)),
                Some('`') => break,
                Some(c) => value.push(c),
            }
        }
        Ok(self.finish(TokenType::Backtick, value, start))
    }

    fn read_template(&mut self, start: Position) -> RunResult<Token> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal", start)),
                Some('\'') => break,
                Some('\\') => value.push(self.read_escape(start)?),
                Some(c) => value.push(c),
            }
        }
        Ok(self.finish(TokenType::Template, value, start))
    }

    fn read_escape(&mut self, start: Position) -> RunResult<char> {
        let Some(ch) = self.bump() else {
            return Err(self.error("unterminated string literal", start));
        };
        let value = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '`' => '`',
            'x' => {
                let hi = self.expect_hex_digit(start)?;
                let lo = self.expect_hex_digit(start)?;
                char::from(hi * 16 + lo)
            }
            'u' => {
                if self.bump() != Some('{') {
                    return Err(self.error("invalid unicode escape", start));
                }
                let mut code: u32 = 0;
                let mut digits = 0;
                loop {
                    match self.bump() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_hexdigit() => {
                            digits += 1;
                            if digits > 6 {
                                return Err(self.error("invalid unicode escape", start));
                            }
                            code = code * 16 + c.to_digit(16).unwrap_or(0);
                        }
                        _ => return Err(self.error("invalid unicode escape", start)),
                    }
                }
                char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape", start))?
            }
            other => return Err(self.error(format!("invalid escape sequence \\{other}"), start)),
        };
        Ok(value)
    }

    fn expect_hex_digit(&mut self, start: Position) -> RunResult<u8> {
        match self.bump() {
            Some(c) if c.is_ascii_hexdigit() => Ok(c.to_digit(16).unwrap_or(0) as u8),
            _ => Err(self.error("invalid hex escape", start)),
        }
    }

    fn read_operator(&mut self, start: Position) -> RunResult<Token> {
        let ch = self.bump().unwrap_or('\0');
        let (kind, literal): (TokenType, &str) = match ch {
            '+' => match self.peek() {
                Some('+') => self.two(TokenType::PlusPlus, "++"),
                Some('=') => self.two(TokenType::PlusEquals, "+="),
                _ => (TokenType::Plus, "+"),
            },
            '-' => match self.peek() {
                Some('-') => self.two(TokenType::MinusMinus, "--"),
                Some('=') => self.two(TokenType::MinusEquals, "-="),
                _ => (TokenType::Minus, "-"),
            },
            '*' => match self.peek() {
                Some('*') => self.two(TokenType::Power, "**"),
                Some('=') => self.two(TokenType::AsteriskEquals, "*="),
                _ => (TokenType::Asterisk, "*"),
            },
            '/' => match self.peek() {
                Some('=') => self.two(TokenType::SlashEquals, "/="),
                _ => (TokenType::Slash, "/"),
            },
            '%' => (TokenType::Percent, "%"),
            '!' => match self.peek() {
                Some('=') => self.two(TokenType::NotEq, "!="),
                _ => (TokenType::Bang, "!"),
            },
            '=' => match self.peek() {
                Some('=') => self.two(TokenType::Eq, "=="),
                _ => (TokenType::Assign, "="),
            },
            ':' => match self.peek() {
                Some('=') => self.two(TokenType::Declare, ":="),
                _ => (TokenType::Colon, ":"),
            },
            '<' => match self.peek() {
                Some('-') => self.two(TokenType::Send, "<-"),
                Some('<') => self.two(TokenType::LtLt, "<<"),
                Some('=') => self.two(TokenType::LtEquals, "<="),
                _ => (TokenType::Lt, "<"),
            },
            '>' => match self.peek() {
                Some('>') => self.two(TokenType::GtGt, ">>"),
                Some('=') => self.two(TokenType::GtEquals, ">="),
                _ => (TokenType::Gt, ">"),
            },
            '&' => match self.peek() {
                Some('&') => self.two(TokenType::And, "&&"),
                _ => return Err(self.error("unexpected character '&'", start)),
            },
            '|' => match self.peek() {
                Some('|') => self.two(TokenType::Or, "||"),
                _ => (TokenType::Pipe, "|"),
            },
            '?' => (TokenType::Question, "?"),
            ';' => (TokenType::Semicolon, ";"),
            ',' => (TokenType::Comma, ","),
            '.' => (TokenType::Period, "."),
            '(' => (TokenType::LParen, "("),
            ')' => (TokenType::RParen, ")"),
            '{' => (TokenType::LBrace, "{"),
            '}' => (TokenType::RBrace, "}"),
            '[' => (TokenType::LBracket, "["),
            ']' => (TokenType::RBracket, "]"),
            other => return Err(self.error(format!("unexpected character {other:?}"), start)),
        };
        Ok(self.finish(kind, literal, start))
    }

    fn two(&mut self, kind: TokenType, literal: &'static str) -> (TokenType, &'static str) {
        self.bump();
        (kind, literal)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().expect("lex");
            if tok.kind == TokenType::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_declaration() {
        assert_eq!(
            kinds("x := 1 + 2"),
            vec![
                TokenType::Ident,
                TokenType::Declare,
                TokenType::Int,
                TokenType::Plus,
                TokenType::Int,
            ]
        );
    }

    #[test]
    fn lexes_channel_operators() {
        assert_eq!(
            kinds("c <- 1; x := <-c"),
            vec![
                TokenType::Ident,
                TokenType::Send,
                TokenType::Int,
                TokenType::Semicolon,
                TokenType::Ident,
                TokenType::Declare,
                TokenType::Send,
                TokenType::Ident,
            ]
        );
    }

    #[test]
    fn distinguishes_shift_from_send() {
        assert_eq!(kinds("1 << 2"), vec![TokenType::Int, TokenType::LtLt, TokenType::Int]);
        assert_eq!(kinds("a <= b"), vec![TokenType::Ident, TokenType::LtEquals, TokenType::Ident]);
    }

    #[test]
    fn lexes_number_forms() {
        let mut lexer = Lexer::new("42 0x2a 052 3.25 1e3");
        let literals: Vec<(TokenType, String)> = std::iter::from_fn(|| {
            let tok = lexer.next_token().expect("lex");
            (tok.kind != TokenType::Eof).then_some((tok.kind, tok.literal))
        })
        .collect();
        assert_eq!(
            literals,
            vec![
                (TokenType::Int, "42".to_owned()),
                (TokenType::Int, "0x2a".to_owned()),
                (TokenType::Int, "052".to_owned()),
                (TokenType::Float, "3.25".to_owned()),
                (TokenType::Float, "1e3".to_owned()),
            ]
        );
    }

    #[test]
    fn int_followed_by_attribute_stays_int() {
        assert_eq!(
            kinds("1.string"),
            vec![TokenType::Int, TokenType::Period, TokenType::Ident]
        );
    }

    #[test]
    fn processes_escapes_in_strings() {
        let mut lexer = Lexer::new(r#""a\tb\n""#);
        let tok = lexer.next_token().expect("lex");
        assert_eq!(tok.kind, TokenType::Str);
        assert_eq!(tok.literal, "a\tb\n");
    }

    #[test]
    fn backtick_strings_are_raw() {
        let mut lexer = Lexer::new(r"`a\tb`");
        let tok = lexer.next_token().expect("lex");
        assert_eq!(tok.kind, TokenType::Backtick);
        assert_eq!(tok.literal, r"a\tb");
    }

    #[test]
    fn unterminated_string_is_terminal() {
        let mut lexer = Lexer::new("\"abc");
        let err = lexer.next_token().expect_err("should fail");
        assert_eq!(err.to_string(), "syntax error: unterminated string literal");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // comment\n# another\n2"),
            vec![TokenType::Int, TokenType::Newline, TokenType::Newline, TokenType::Int]
        );
    }

    #[test]
    fn tracks_positions() {
        let mut lexer = Lexer::new("a\n bb");
        let a = lexer.next_token().expect("lex");
        assert_eq!((a.start.line, a.start.column), (0, 0));
        let newline = lexer.next_token().expect("lex");
        assert_eq!(newline.kind, TokenType::Newline);
        let bb = lexer.next_token().expect("lex");
        assert_eq!((bb.start.line, bb.start.column), (1, 1));
        assert_eq!(lexer.line_text(&bb), " bb");
    }
}
