//! Solver failure taxonomy.

use thiserror::Error;

pub type SolverResult<T> = Result<T, SolverError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Jacobian is singular (factorization failed)")]
    SingularJacobian,

    #[error("Iteration budget exhausted after {iterations} iterations")]
    ConvergenceFailed { iterations: usize },

    #[error("System size {size} exceeds solver capacity {capacity}")]
    OversizeSystem { size: usize, capacity: usize },

    #[error("Integrator step size collapsed at t = {t}")]
    StepSizeCollapsed { t: f64 },

    #[error("Non-positive pivot in sparse factorization at row {row}")]
    NonPositivePivot { row: usize },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Derivative evaluation failed: {what}")]
    Derivative { what: String },
}
