//! Expression compilation errors.

use thiserror::Error;

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("Unexpected token '{found}' at position {pos}")]
    UnexpectedToken { pos: usize, found: String },

    #[error("Formula ended unexpectedly")]
    UnexpectedEnd,

    #[error("Unknown function '{name}' at position {pos}")]
    UnknownFunction { pos: usize, name: String },

    #[error("Unknown variable '{name}' at position {pos}")]
    UnknownVariable { pos: usize, name: String },
}
