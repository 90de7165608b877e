//! Engine errors

use thiserror::Error;

/// Engine result type
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{name}() takes {expected} argument(s), got {got}")]
    FunctionArity {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error(transparent)]
    Lex(#[from] apl_dsl::LexError),

    #[error(transparent)]
    Parse(#[from] apl_dsl::ParseError),
}
