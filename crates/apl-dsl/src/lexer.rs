//! Lexer for APL scripts.
//!
//! Uses Logos for fast, compile-time optimized tokenization.
//!
//! Newlines are significant (they separate action lines) and are emitted
//! as tokens; all other whitespace is skipped. Dots are emitted as
//! separate [`Token::Dot`] tokens so the parser can reassemble dotted
//! identifier paths.

use logos::{Logos, Span};

/// Token type for the APL script language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    /// Statement separator
    #[token("\n")]
    Newline,

    // === Literals ===
    /// Integer or decimal literal
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// Quoted string literal (single or double quotes, backslash escapes)
    #[regex(r#""([^"\\\n]|\\.)*""#, unescape)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, unescape)]
    Str(String),

    /// Identifier (a single path segment; dots are separate tokens)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // === Multi-character operators ===
    #[token("%%")]
    PercentPercent,
    #[token("+=")]
    PlusEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("!~")]
    BangTilde,

    // === Single-character operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,

    // === Punctuation ===
    #[token("/")]
    Slash,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

fn unescape(lex: &mut logos::Lexer<Token>) -> String {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Error during lexing, with 1-based source position
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for LexError {}

/// Compute the 1-based (line, column) of a byte offset
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Tokenize source code into a vector of spanned tokens
pub fn lex(source: &str) -> Result<Vec<Spanned<Token>>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(Spanned::new(token, lexer.span())),
            Err(()) => {
                let (line, column) = line_col(source, lexer.span().start);
                return Err(LexError {
                    message: format!("unexpected character(s) '{}'", lexer.slice()),
                    line,
                    column,
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("42 3.14 .5");
        assert_eq!(
            tokens,
            vec![
                Token::Number(42.0),
                Token::Number(3.14),
                Token::Number(0.5)
            ]
        );
    }

    #[test]
    fn test_dotted_identifier_is_separate_tokens() {
        let tokens = kinds("buff.steady_focus.stack");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("buff".into()),
                Token::Dot,
                Token::Ident("steady_focus".into()),
                Token::Dot,
                Token::Ident("stack".into()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("+ - * % %% = == != < <= > >= & | ^ ! ~ !~ +=");
        assert_eq!(
            tokens,
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Percent,
                Token::PercentPercent,
                Token::Eq,
                Token::EqEq,
                Token::BangEq,
                Token::Lt,
                Token::LtEq,
                Token::Gt,
                Token::GtEq,
                Token::Amp,
                Token::Pipe,
                Token::Caret,
                Token::Bang,
                Token::Tilde,
                Token::BangTilde,
                Token::PlusEq,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        let tokens = kinds("/ , : ; ( )");
        assert_eq!(
            tokens,
            vec![
                Token::Slash,
                Token::Comma,
                Token::Colon,
                Token::Semicolon,
                Token::LParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_newlines_are_significant() {
        let tokens = kinds("a\nb");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Newline,
                Token::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = kinds("fireball # cast it\nfrostbolt");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("fireball".into()),
                Token::Newline,
                Token::Ident("frostbolt".into()),
            ]
        );
    }

    #[test]
    fn test_strings() {
        let tokens = kinds(r#""hello \"world\"" 'x'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Str("hello \"world\"".into()),
                Token::Str("x".into())
            ]
        );
    }

    #[test]
    fn test_unknown_character_reports_position() {
        let err = lex("mana > 50\nfocus @ 2").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 7);
    }

    #[test]
    fn test_action_line() {
        let tokens = kinds("actions+=arcane_shot,if=focus>40");
        assert_eq!(tokens[0], Token::Ident("actions".into()));
        assert_eq!(tokens[1], Token::PlusEq);
        assert_eq!(tokens[2], Token::Ident("arcane_shot".into()));
        assert_eq!(tokens[3], Token::Comma);
        assert_eq!(tokens[4], Token::Ident("if".into()));
        assert_eq!(tokens[5], Token::Eq);
    }
}
