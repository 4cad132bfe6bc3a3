//! Network construction and validation errors.

use thiserror::Error;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Link '{link}' references a node that does not exist (index {node})")]
    InvalidNodeRef { link: String, node: u32 },

    #[error("Link '{link}' connects a node to itself")]
    SelfLoop { link: String },

    #[error("Link '{link}' has non-positive {what}")]
    BadGeometry { link: String, what: &'static str },

    #[error("Tank host node index {node} does not exist")]
    InvalidTankNode { node: u32 },

    #[error("Node index {node} already hosts a tank")]
    DuplicateTank { node: u32 },

    #[error("Source on node {node} references species index {species} which does not exist")]
    InvalidSourceSpecies { node: u32, species: u32 },

    #[error("Species index {species} does not exist")]
    InvalidSpeciesRef { species: u32 },

    #[error("Node index {node} does not exist")]
    InvalidNodeIndex { node: u32 },

    #[error("Hydraulic state has {got} {what} values, network has {want}")]
    HydraulicMismatch {
        what: &'static str,
        got: usize,
        want: usize,
    },
}
