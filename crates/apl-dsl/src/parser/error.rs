//! Parse error types.

use std::fmt;

use crate::lexer::Token;

/// Category of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A specific token was expected, something else was found.
    UnexpectedToken,
    /// Input ended while a construct was incomplete.
    UnexpectedEof,
    /// Tokens present but grammatically invalid.
    InvalidSyntax,
}

/// Parse error with 1-based source location.
///
/// The parser recovers per line: an error skips the rest of the offending
/// line and parsing continues, so a script with one bad line still yields
/// every other line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl ParseError {
    /// Create an "expected token" error.
    pub fn expected_token(expected: &Token, found: Option<&Token>, pos: (u32, u32)) -> Self {
        let message = match found {
            Some(token) => format!("expected {expected:?}, found {token:?}"),
            None => format!("expected {expected:?}, found end of input"),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            line: pos.0,
            column: pos.1,
            message,
        }
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(found: Option<&Token>, context: &str, pos: (u32, u32)) -> Self {
        let message = match found {
            Some(token) => format!("unexpected {token:?} {context}"),
            None => format!("unexpected end of input {context}"),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            line: pos.0,
            column: pos.1,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, pos: (u32, u32)) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            line: pos.0,
            column: pos.1,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}
