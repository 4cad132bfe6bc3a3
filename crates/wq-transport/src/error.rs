//! Top-level errors. The transport engine is the single point where
//! lower-crate failures abort a run, so everything converts into
//! [`TransportError`] here.

use thiserror::Error;
use wq_chem::ChemError;
use wq_core::WqError;
use wq_network::NetworkError;
use wq_solver::SolverError;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No hydraulic state has been loaded")]
    MissingHydraulics,

    #[error("Core error: {0}")]
    Core(#[from] WqError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Chemistry failed in {context}: {source}")]
    Chem {
        context: String,
        source: ChemError,
    },

    #[error("Dispersion solve failed for species '{species}': {source}")]
    Dispersion {
        species: String,
        source: SolverError,
    },
}

impl TransportError {
    pub(crate) fn chem(context: impl Into<String>, source: ChemError) -> Self {
        Self::Chem {
            context: context.into(),
            source,
        }
    }
}
