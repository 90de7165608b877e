//! Action priority list DSL
//!
//! Parses the line-oriented rotation-script format into an [`ActionList`]:
//! one action per line, a priority order given by line position, and
//! guard conditions written in a small numeric expression language.
//!
//! ```
//! let outcome = apl_dsl::parse("actions=fireball,if=mana>50\nactions+=frostbolt").unwrap();
//! assert_eq!(outcome.list.lines.len(), 2);
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{ActionLine, ActionList, BinaryOp, Expr, IdentPath, OptionValue, UnaryOp};
pub use lexer::{lex, LexError, Spanned, Token};
pub use parser::{parse, parse_expression, ParseError, ParseOutcome};
