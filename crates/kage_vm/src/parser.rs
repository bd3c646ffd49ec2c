//! Recursive-descent parser.
//!
//! ```text
//! program := expr*
//! expr    := string | "encrypt" expr | "decrypt" expr
//! string  := '"' [^"]* '"'
//! ```
//!
//! Parsing is all-or-nothing: the first error aborts and no partial tree is
//! returned. Whitespace between tokens is skipped greedily.

use crate::ast::{Expr, Program};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseErrorKind {
    UnclosedString,
    MissingOperand,
    InvalidToken,
    EmptySource,
    NestingTooDeep,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse: {kind:?} at offset {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Maximum number of nested `encrypt`/`decrypt` keywords per statement.
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Encrypt,
    Decrypt,
}

/// Immutable source plus a forward-only scan position.
#[derive(Debug, Clone)]
pub struct SourceCursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> SourceCursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// Bytes up to the next whitespace, quote or end of input.
    fn word(&self) -> &'a str {
        let rest = &self.src[self.pos..];
        let end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '"')
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.src.len());
    }

    fn jump_to_end(&mut self) {
        self.pos = self.src.len();
    }
}

pub struct Parser<'a> {
    cursor: SourceCursor<'a>,
    cfg: ParserConfig,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::with_config(src, ParserConfig::default())
    }

    pub fn with_config(src: &'a str, cfg: ParserConfig) -> Self {
        Self { cursor: SourceCursor::new(src), cfg }
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.at_end() {
                break;
            }
            statements.push(self.parse_expr(0)?);
        }
        if statements.is_empty() {
            return Err(ParseError::new(ParseErrorKind::EmptySource, self.cursor.position()));
        }
        debug!(statements = statements.len(), bytes = self.cursor.len(), "parsed program");
        Ok(Program { statements })
    }

    fn parse_expr(&mut self, depth: usize) -> Result<Expr, ParseError> {
        self.cursor.skip_whitespace();
        let start = self.cursor.position();
        match self.cursor.peek() {
            None => Err(ParseError::new(ParseErrorKind::MissingOperand, start)),
            Some(b'"') => self.parse_string(),
            Some(_) => {
                let kw = self.keyword()?;
                if depth >= self.cfg.max_depth {
                    return Err(ParseError::new(ParseErrorKind::NestingTooDeep, start));
                }
                self.cursor.skip_whitespace();
                if self.cursor.at_end() {
                    return Err(ParseError::new(
                        ParseErrorKind::MissingOperand,
                        self.cursor.position(),
                    ));
                }
                let operand = self.parse_expr(depth + 1)?;
                Ok(match kw {
                    Keyword::Encrypt => Expr::encrypt(start, operand),
                    Keyword::Decrypt => Expr::decrypt(start, operand),
                })
            }
        }
    }

    fn keyword(&mut self) -> Result<Keyword, ParseError> {
        let start = self.cursor.position();
        let word = self.cursor.word();
        let kw = match word {
            "encrypt" => Keyword::Encrypt,
            "decrypt" => Keyword::Decrypt,
            _ => {
                // Step over the bad token so a resumed scan cannot spin on it.
                self.cursor.advance(word.len().max(1));
                return Err(ParseError::new(ParseErrorKind::InvalidToken, start));
            }
        };
        self.cursor.advance(word.len());
        Ok(kw)
    }

    fn parse_string(&mut self) -> Result<Expr, ParseError> {
        let open = self.cursor.position();
        let body = &self.cursor.src[open + 1..];
        match body.find('"') {
            Some(len) => {
                let value = &body[..len];
                self.cursor.advance(len + 2);
                Ok(Expr::string(open, value))
            }
            None => {
                self.cursor.jump_to_end();
                Err(ParseError::new(ParseErrorKind::UnclosedString, open))
            }
        }
    }
}

/// Parse `src` with default limits.
pub fn parse(src: &str) -> Result<Program, ParseError> {
    Parser::new(src).parse_program()
}

pub fn parse_with(src: &str, cfg: ParserConfig) -> Result<Program, ParseError> {
    Parser::with_config(src, cfg).parse_program()
}
