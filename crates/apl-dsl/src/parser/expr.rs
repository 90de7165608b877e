//! Expression parser - precedence climbing for binary and unary operators.

use super::{ParseError, TokenStream};
use crate::ast::{BinaryOp, Expr, IdentPath, UnaryOp};
use crate::lexer::Token;

/// Get binary operator metadata (precedence and operator enum).
///
/// Higher precedence binds tighter. All binary operators are
/// left-associative. This table is the single source of truth for
/// binary operator parsing; lowest to highest it reads
/// `|` < `&` < equality/match < relational < additive < multiplicative.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::Pipe => Some((10, BinaryOp::Or)),
        Token::Amp => Some((20, BinaryOp::And)),
        Token::Caret => Some((20, BinaryOp::Xor)),
        Token::Eq => Some((30, BinaryOp::Eq)),
        Token::EqEq => Some((30, BinaryOp::Eq)),
        Token::BangEq => Some((30, BinaryOp::Ne)),
        Token::Tilde => Some((30, BinaryOp::Match)),
        Token::BangTilde => Some((30, BinaryOp::NotMatch)),
        Token::Lt => Some((40, BinaryOp::Lt)),
        Token::LtEq => Some((40, BinaryOp::Le)),
        Token::Gt => Some((40, BinaryOp::Gt)),
        Token::GtEq => Some((40, BinaryOp::Ge)),
        Token::Plus => Some((50, BinaryOp::Add)),
        Token::Minus => Some((50, BinaryOp::Sub)),
        Token::Star => Some((60, BinaryOp::Mul)),
        Token::Percent => Some((60, BinaryOp::Mod)),
        Token::PercentPercent => Some((60, BinaryOp::ModMod)),
        _ => None,
    }
}

/// Parse a full expression.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    parse_binary(stream, 0)
}

/// Precedence-climbing core.
fn parse_binary(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        let Some((prec, op)) = binary_op_info(token) else {
            break;
        };
        if prec < min_prec {
            break;
        }
        stream.advance();

        let right = parse_binary(stream, prec + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

/// Parse prefix expressions (unary operators, then atoms).
fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let op = match stream.peek() {
        Some(Token::Bang) => Some(UnaryOp::Not),
        Some(Token::Minus) => Some(UnaryOp::Neg),
        Some(Token::Plus) => Some(UnaryOp::Plus),
        _ => None,
    };

    if let Some(op) = op {
        stream.advance();
        let operand = parse_prefix(stream)?;
        return Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        });
    }

    parse_atom(stream)
}

/// Parse primary expressions: literals, identifier paths, function calls,
/// parenthesized expressions.
fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let pos = stream.position();
    match stream.peek().cloned() {
        Some(Token::Number(value)) => {
            stream.advance();
            Ok(Expr::Literal(value))
        }
        // String literals fold to numbers: numeric strings parse, an empty
        // string is 0 and any other string is 1.
        Some(Token::Str(s)) => {
            stream.advance();
            let value = s
                .parse::<f64>()
                .unwrap_or(if s.is_empty() { 0.0 } else { 1.0 });
            Ok(Expr::Literal(value))
        }
        Some(Token::Ident(name)) => {
            stream.advance();
            if stream.check(&Token::LParen) {
                let args = parse_call_args(stream)?;
                return Ok(Expr::Call { name, args });
            }
            let mut segments = vec![name];
            while stream.check(&Token::Dot) {
                stream.advance();
                match stream.advance().cloned() {
                    Some(Token::Ident(segment)) => segments.push(segment),
                    found => {
                        return Err(ParseError::unexpected_token(
                            found.as_ref(),
                            "after '.' in identifier path",
                            pos,
                        ));
                    }
                }
            }
            Ok(Expr::Path(IdentPath::new(segments)))
        }
        Some(Token::LParen) => {
            stream.advance();
            let expr = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            Ok(expr)
        }
        found => Err(ParseError::unexpected_token(
            found.as_ref(),
            "where an expression was expected",
            pos,
        )),
    }
}

/// Parse function call arguments.
fn parse_call_args(stream: &mut TokenStream) -> Result<Vec<Expr>, ParseError> {
    stream.expect(Token::LParen)?;

    let mut args = Vec::new();
    while !stream.check(&Token::RParen) {
        args.push(parse_expr(stream)?);
        if !stream.check(&Token::RParen) {
            stream.expect(Token::Comma)?;
        }
    }

    stream.expect(Token::RParen)?;
    Ok(args)
}
