use thiserror::Error;

pub type WqResult<T> = Result<T, WqError>;

/// Faults shared by every layer of the engine. Domain-specific errors
/// (network validation, expression compilation, solver failures) live in
/// their own crates and wrap or stand beside this one.
#[derive(Error, Debug)]
pub enum WqError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Allocation failure in the segment arena or a solver workspace;
    /// the run halts rather than continuing with partial state.
    #[error("Out of memory: {what}")]
    OutOfMemory { what: &'static str },
}
