//! Recursive descent parser for APL scripts.
//!
//! A script is a sequence of action lines separated by newlines. Each line
//! names an action and carries `key=value` options; the values of guard
//! options (`if`, `interrupt_if`, ...) are parsed as full expressions.
//!
//! The parser recovers per line: a syntax error skips to the next newline
//! and parsing resumes, so one bad line never discards the rest of the
//! script. All errors are collected in [`ParseOutcome::errors`].

mod error;
mod expr;
mod stream;

pub use error::{ParseError, ParseErrorKind};
pub use stream::TokenStream;

use tracing::debug;

use crate::ast::{normalize_name, ActionLine, ActionList, Expr, OptionValue, EXPRESSION_OPTIONS};
use crate::lexer::{lex, LexError, Token};

/// Result of parsing a script: the recovered action list plus any
/// per-line errors encountered along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub list: ActionList,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse a full APL script.
///
/// Lexing failures abort the whole parse; grammar errors are recovered
/// per line and reported in the outcome.
pub fn parse(source: &str) -> Result<ParseOutcome, LexError> {
    let tokens = lex(source)?;
    let mut stream = TokenStream::new(&tokens, source);

    let mut list = ActionList::default();
    let mut errors = Vec::new();

    while !stream.at_end() {
        if stream.eat(&Token::Newline) {
            continue;
        }
        match parse_action_line(&mut stream) {
            Ok(Some(line)) => list.push(line),
            Ok(None) => {}
            Err(err) => {
                debug!(line = err.line, column = err.column, %err, "recovering from parse error");
                errors.push(err);
                stream.synchronize();
                continue;
            }
        }
        if !stream.at_end() {
            if let Err(err) = stream.expect(Token::Newline) {
                errors.push(err);
                stream.synchronize();
            }
        }
    }

    Ok(ParseOutcome { list, errors })
}

/// Parse a standalone expression, e.g. for validation tooling.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = lex(source).map_err(|e| {
        ParseError::invalid_syntax(e.message.clone(), (e.line, e.column))
    })?;
    let mut stream = TokenStream::new(&tokens, source);
    let expr = expr::parse_expr(&mut stream)?;
    while stream.eat(&Token::Newline) {}
    if !stream.at_end() {
        return Err(ParseError::unexpected_token(
            stream.peek(),
            "after expression",
            stream.position(),
        ));
    }
    Ok(expr)
}

/// Parse one action line.
///
/// Grammar (all prefixes optional):
/// ```text
/// line := [ "actions" [ "." ident ] ("=" | "+=") ] [ "/" ] name { "," option }
/// option := ident "=" ( expression | scalar )
/// ```
///
/// Returns `Ok(None)` for a bare `actions=` header with no action name,
/// which declares the list without adding a line.
fn parse_action_line(stream: &mut TokenStream) -> Result<Option<ActionLine>, ParseError> {
    let (line_no, _) = stream.position();

    // `actions=`, `actions+=`, `actions.sublist+=` prefixes. Sublist
    // names are accepted and flattened into the single list.
    if matches!(stream.peek(), Some(Token::Ident(name)) if name == "actions") {
        let after = stream.peek_nth(1);
        if matches!(after, Some(Token::Eq | Token::PlusEq | Token::Dot)) {
            stream.advance();
            if stream.eat(&Token::Dot) {
                match stream.advance() {
                    Some(Token::Ident(_)) => {}
                    found => {
                        let found = found.cloned();
                        return Err(ParseError::unexpected_token(
                            found.as_ref(),
                            "after 'actions.'",
                            stream.position(),
                        ));
                    }
                }
            }
            if !stream.eat(&Token::Eq) && !stream.eat(&Token::PlusEq) {
                return Err(ParseError::unexpected_token(
                    stream.peek(),
                    "after 'actions' (expected '=' or '+=')",
                    stream.position(),
                ));
            }
            // `actions=` alone starts an empty list
            if stream.at_end() || stream.check(&Token::Newline) {
                return Ok(None);
            }
        }
    }

    stream.eat(&Token::Slash);

    let name = match stream.advance().cloned() {
        Some(Token::Ident(name)) => name,
        found => {
            return Err(ParseError::unexpected_token(
                found.as_ref(),
                "where an action name was expected",
                stream.position(),
            ));
        }
    };

    let mut line = ActionLine::new(&name);
    line.line = line_no;

    while stream.eat(&Token::Comma) {
        parse_option(stream, &mut line)?;
    }

    Ok(Some(line))
}

/// Parse one `key=value` option and attach it to the line.
fn parse_option(stream: &mut TokenStream, line: &mut ActionLine) -> Result<(), ParseError> {
    let key = match stream.advance().cloned() {
        Some(Token::Ident(key)) => key,
        found => {
            return Err(ParseError::unexpected_token(
                found.as_ref(),
                "where an option name was expected",
                stream.position(),
            ));
        }
    };
    stream.expect(Token::Eq)?;

    if EXPRESSION_OPTIONS.contains(&key.as_str()) {
        let expr = expr::parse_expr(stream)?;
        match key.as_str() {
            "if" => line.if_expr = Some(expr),
            "interrupt_if" => line.interrupt_if_expr = Some(expr),
            "target_if" => line.target_if_expr = Some(expr),
            "wait_on_ready" => line.wait_on_ready_expr = Some(expr),
            "line_cd" => line.line_cd_expr = Some(expr),
            _ => unreachable!(),
        }
    } else {
        let value = parse_scalar(stream)?;
        line.options.insert(key, value);
    }
    Ok(())
}

/// Parse a scalar option value: a number (optionally signed), a quoted
/// string, or a bare word (dotted words are joined back together).
fn parse_scalar(stream: &mut TokenStream) -> Result<OptionValue, ParseError> {
    let negative = stream.eat(&Token::Minus);
    match stream.advance().cloned() {
        Some(Token::Number(n)) => Ok(OptionValue::Number(if negative { -n } else { n })),
        Some(Token::Str(s)) if !negative => Ok(OptionValue::Text(s)),
        Some(Token::Ident(first)) if !negative => {
            let mut text = first;
            while stream.check(&Token::Dot) {
                stream.advance();
                match stream.advance().cloned() {
                    Some(Token::Ident(seg)) => {
                        text.push('.');
                        text.push_str(&seg);
                    }
                    found => {
                        return Err(ParseError::unexpected_token(
                            found.as_ref(),
                            "after '.' in option value",
                            stream.position(),
                        ));
                    }
                }
            }
            Ok(OptionValue::Text(normalize_name(&text)))
        }
        found => Err(ParseError::unexpected_token(
            found.as_ref(),
            "where an option value was expected",
            stream.position(),
        )),
    }
}
