//! Chemistry errors. One failure aborts the whole water-quality step;
//! the transport engine adds the pipe/tank context before surfacing it.

use thiserror::Error;

pub type ChemResult<T> = Result<T, ChemError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChemError {
    #[error("Illegal math operation '{op}' (value {value}) while evaluating {context} for species '{species}'")]
    MathFault {
        op: &'static str,
        value: f64,
        species: String,
        context: &'static str,
    },

    #[error("Equilibrium solve failed for species group [{species}]: {source}")]
    Equilibrium {
        species: String,
        source: wq_solver::SolverError,
    },

    #[error("Rate integration failed: {source}")]
    Integration { source: wq_solver::SolverError },
}
