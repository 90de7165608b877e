//! Token stream wrapper for the hand-written parser.

use crate::lexer::{line_col, Spanned, Token};

/// A token paired with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Positioned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

/// Token stream with lookahead and position tracking.
///
/// Provides methods for consuming tokens, lookahead, and per-line error
/// recovery for the recursive descent parser.
pub struct TokenStream {
    tokens: Vec<Positioned>,
    pos: usize,
}

impl TokenStream {
    /// Build a stream from spanned tokens, resolving byte spans to
    /// line/column positions against the source text.
    pub fn new(tokens: &[Spanned<Token>], source: &str) -> Self {
        let tokens = tokens
            .iter()
            .map(|s| {
                let (line, column) = line_col(source, s.span.start);
                Positioned {
                    token: s.token.clone(),
                    line,
                    column,
                }
            })
            .collect();
        Self { tokens, pos: 0 }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|p| &p.token)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|p| &p.token)
    }

    /// Advance to the next token and return it.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|p| &p.token);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token kind.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches the expected kind.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance past it.
    pub fn expect(&mut self, expected: Token) -> Result<(), super::ParseError> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(super::ParseError::expected_token(
                &expected,
                self.peek(),
                self.position(),
            ))
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Source position of the current token (or of the last token at EOF).
    pub fn position(&self) -> (u32, u32) {
        if let Some(p) = self.tokens.get(self.pos) {
            (p.line, p.column)
        } else if let Some(p) = self.tokens.last() {
            (p.line, p.column)
        } else {
            (1, 1)
        }
    }

    /// Skip past the next newline for per-line error recovery.
    pub fn synchronize(&mut self) {
        while !self.at_end() && !self.check(&Token::Newline) {
            self.advance();
        }
        self.eat(&Token::Newline);
    }
}
