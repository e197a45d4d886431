//! The tokenizer: one source file in, a flat token list out, terminated by a
//! single `EOF` token.
//!
//! Lexical failures are fatal: a malformed literal or an unterminated
//! comment aborts the whole invocation instead of producing a diagnostic.

mod cursor;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use smol_str::SmolStr;

use crate::diagnostics::FatalError;
use crate::lexer::cursor::Cursor;
use crate::syntax::{Position, SourcePath, Span, Token, TokenKind};
use crate::T;

/// Reads and tokenizes the file at `path`.
pub fn tokenize(path: &Path) -> Result<Vec<Token>, FatalError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FatalError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    tokenize_source(Arc::new(path.to_path_buf()), &raw)
}

/// Tokenizes an in-memory buffer attributed to `origin`.
pub fn tokenize_source(origin: SourcePath, raw: &str) -> Result<Vec<Token>, FatalError> {
    let source = normalize_line_endings(raw);
    let mut lexer = Lexer {
        origin,
        cursor: Cursor::new(&source),
        tokens: Vec::with_capacity(source.len() / 4 + 8),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

/// `\r\n` and lone `\r` both become `\n` before any position is computed.
fn normalize_line_endings(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_body(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Lexer<'a> {
    origin: SourcePath,
    cursor: Cursor<'a>,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), FatalError> {
        loop {
            self.skip_trivia()?;
            if self.cursor.is_eof() {
                break;
            }

            let c = self.cursor.first();
            if is_identifier_start(c) {
                self.identifier();
            } else if c.is_ascii_digit() || (c == '.' && self.cursor.second().is_ascii_digit()) {
                self.number(c == '.')?;
            } else if c == '"' {
                self.string()?;
            } else if c == '<' && self.last_token_is(T![include]) {
                self.header()?;
            } else {
                self.punct(c)?;
            }
        }

        let at = self.cursor.position();
        self.tokens.push(Token {
            kind: TokenKind::EOF,
            text: SmolStr::default(),
            origin: self.origin.clone(),
            span: Span { start: at, end: at },
        });
        Ok(())
    }

    fn last_token_is(&self, kind: TokenKind) -> bool {
        self.tokens.last().map(|t| t.kind) == Some(kind)
    }

    fn error(&self, message: impl Into<String>) -> FatalError {
        self.error_at(self.cursor.position(), message)
    }

    fn error_at(&self, at: Position, message: impl Into<String>) -> FatalError {
        FatalError::Tokenize {
            path: PathBuf::clone(&self.origin),
            line: at.line,
            column: at.column,
            message: message.into(),
        }
    }

    fn push(&mut self, kind: TokenKind, start: Position, start_offset: usize) {
        let text = SmolStr::new(self.cursor.slice_from(start_offset));
        self.tokens.push(Token {
            kind,
            text,
            origin: self.origin.clone(),
            span: Span {
                start,
                end: self.cursor.position(),
            },
        });
    }

    fn skip_trivia(&mut self) -> Result<(), FatalError> {
        loop {
            let c = self.cursor.first();
            if c.is_ascii_whitespace() && !self.cursor.is_eof() {
                self.cursor.bump();
                continue;
            }
            if c == '/' && self.cursor.second() == '/' {
                self.cursor.bump();
                self.cursor.bump();
                self.cursor.eat_while(|c| c != '\n');
                continue;
            }
            if c == '/' && self.cursor.second() == '*' {
                let start = self.cursor.position();
                self.cursor.bump();
                self.cursor.bump();
                let mut closed = false;
                while !self.cursor.is_eof() {
                    if self.cursor.first() == '*' && self.cursor.second() == '/' {
                        self.cursor.bump();
                        self.cursor.bump();
                        closed = true;
                        break;
                    }
                    self.cursor.bump();
                }
                if !closed {
                    return Err(self.error(format!(
                        "Unterminated block comment that started at line {}",
                        start.line
                    )));
                }
                continue;
            }
            return Ok(());
        }
    }

    fn identifier(&mut self) {
        let start = self.cursor.position();
        let begin = self.cursor.offset();

        self.cursor.bump();
        self.cursor.eat_while(is_identifier_body);

        let lexeme = self.cursor.slice_from(begin);
        let kind = TokenKind::from_keyword(lexeme).unwrap_or(TokenKind::IDENT);
        self.push(kind, start, begin);
    }

    fn number(&mut self, leading_dot: bool) -> Result<(), FatalError> {
        let start = self.cursor.position();
        let begin = self.cursor.offset();

        let mut is_float = false;

        if leading_dot {
            is_float = true;
            self.cursor.bump();
            if !self.cursor.first().is_ascii_digit() {
                return Err(self.error("Malformed floating-point literal"));
            }
        }

        if !leading_dot
            && self.cursor.first() == '0'
            && matches!(self.cursor.second(), 'x' | 'X')
        {
            self.cursor.bump();
            self.cursor.bump();
            if !self.cursor.first().is_ascii_hexdigit() {
                return Err(self.error("Malformed hexadecimal literal"));
            }
            self.cursor.eat_while(|c| c.is_ascii_hexdigit());
            if matches!(self.cursor.first(), 'u' | 'U') {
                self.cursor.bump();
            }
            self.push(TokenKind::INT_NUMBER, start, begin);
            return Ok(());
        }

        self.cursor.eat_while(|c| c.is_ascii_digit());

        if !leading_dot && self.cursor.first() == '.' {
            is_float = true;
            self.cursor.bump();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        if matches!(self.cursor.first(), 'e' | 'E') {
            is_float = true;
            self.cursor.bump();
            if matches!(self.cursor.first(), '+' | '-') {
                self.cursor.bump();
            }
            if !self.cursor.first().is_ascii_digit() {
                return Err(self.error("Malformed exponent in numeric literal"));
            }
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        if matches!(self.cursor.first(), 'f' | 'F') {
            is_float = true;
            self.cursor.bump();
        } else if !is_float && matches!(self.cursor.first(), 'u' | 'U') {
            self.cursor.bump();
        }

        let kind = if is_float {
            TokenKind::FLOAT_NUMBER
        } else {
            TokenKind::INT_NUMBER
        };
        self.push(kind, start, begin);
        Ok(())
    }

    fn string(&mut self) -> Result<(), FatalError> {
        let start = self.cursor.position();
        let begin = self.cursor.offset();
        self.cursor.bump();

        let mut closed = false;
        let mut escaping = false;
        while let Some(c) = self.cursor.bump() {
            if !escaping && c == '\n' {
                return Err(self.error("Unterminated string literal"));
            }
            if !escaping && c == '"' {
                closed = true;
                break;
            }
            escaping = !escaping && c == '\\';
        }
        if !closed {
            return Err(self.error("Unterminated string literal"));
        }

        self.push(TokenKind::STRING, start, begin);
        Ok(())
    }

    fn header(&mut self) -> Result<(), FatalError> {
        let start = self.cursor.position();
        let begin = self.cursor.offset();
        self.cursor.bump();

        let mut closed = false;
        while let Some(c) = self.cursor.bump() {
            if c == '>' {
                closed = true;
                break;
            }
            if c == '\n' {
                return Err(self.error("Unterminated header literal"));
            }
        }
        if !closed {
            return Err(self.error("Unterminated header literal"));
        }

        self.push(TokenKind::HEADER_NAME, start, begin);
        Ok(())
    }

    /// Longest-match punctuation and operators.
    fn punct(&mut self, c: char) -> Result<(), FatalError> {
        let start = self.cursor.position();
        let begin = self.cursor.offset();
        self.cursor.bump();

        let kind = match c {
            '#' => T![#],
            '(' => T!['('],
            ')' => T![')'],
            '{' => T!['{'],
            '}' => T!['}'],
            '[' => T!['['],
            ']' => T![']'],
            ';' => T![;],
            ',' => T![,],
            '.' => T![.],
            '?' => T![?],
            '~' => T![~],
            ':' => {
                if self.cursor.first() == ':' {
                    self.cursor.bump();
                    T![::]
                } else {
                    T![:]
                }
            }
            '<' => match self.cursor.first() {
                '<' => {
                    self.cursor.bump();
                    if self.cursor.first() == '=' {
                        self.cursor.bump();
                        T![<<=]
                    } else {
                        T![<<]
                    }
                }
                '=' => {
                    self.cursor.bump();
                    T![<=]
                }
                _ => T![<],
            },
            '>' => match self.cursor.first() {
                '>' => {
                    self.cursor.bump();
                    if self.cursor.first() == '=' {
                        self.cursor.bump();
                        T![>>=]
                    } else {
                        T![>>]
                    }
                }
                '=' => {
                    self.cursor.bump();
                    T![>=]
                }
                _ => T![>],
            },
            '=' => {
                if self.cursor.first() == '=' {
                    self.cursor.bump();
                    T![==]
                } else {
                    T![=]
                }
            }
            '!' => {
                if self.cursor.first() == '=' {
                    self.cursor.bump();
                    T![!=]
                } else {
                    T![!]
                }
            }
            '+' => match self.cursor.first() {
                '+' => {
                    self.cursor.bump();
                    T![++]
                }
                '=' => {
                    self.cursor.bump();
                    T![+=]
                }
                _ => T![+],
            },
            '-' => match self.cursor.first() {
                '>' => {
                    self.cursor.bump();
                    T![->]
                }
                '-' => {
                    self.cursor.bump();
                    T![--]
                }
                '=' => {
                    self.cursor.bump();
                    T![-=]
                }
                _ => T![-],
            },
            '*' => {
                if self.cursor.first() == '=' {
                    self.cursor.bump();
                    T![*=]
                } else {
                    T![*]
                }
            }
            '/' => {
                if self.cursor.first() == '=' {
                    self.cursor.bump();
                    T![/=]
                } else {
                    T![/]
                }
            }
            '%' => {
                if self.cursor.first() == '=' {
                    self.cursor.bump();
                    T![%=]
                } else {
                    T![%]
                }
            }
            '&' => match self.cursor.first() {
                '&' => {
                    self.cursor.bump();
                    T![&&]
                }
                '=' => {
                    self.cursor.bump();
                    T![&=]
                }
                _ => T![&],
            },
            '|' => match self.cursor.first() {
                '|' => {
                    self.cursor.bump();
                    T![||]
                }
                '=' => {
                    self.cursor.bump();
                    T![|=]
                }
                _ => T![|],
            },
            '^' => {
                if self.cursor.first() == '=' {
                    self.cursor.bump();
                    T![^=]
                } else {
                    T![^]
                }
            }
            _ => {
                return Err(self.error_at(start, format!("Unexpected character '{c}'")));
            }
        };

        self.push(kind, start, begin);
        Ok(())
    }
}
