//! wq-network: static model of the piped network and its species.
//!
//! The network is built incrementally with [`NetworkBuilder`], validated,
//! and frozen into an immutable [`Network`]. Per-step mutable state
//! (segment contents, tank volumes, node quality) lives in the transport
//! engine, not here; the only dynamic structure in this crate is
//! [`FlowAdjacency`], which is rebuilt whenever a link's flow direction
//! changes.

pub mod adjacency;
pub mod builder;
pub mod error;
pub mod hydraulics;
pub mod network;
pub mod objects;
pub mod species;

pub use adjacency::FlowAdjacency;
pub use builder::NetworkBuilder;
pub use error::{NetworkError, NetworkResult};
pub use hydraulics::{FlowDir, HydraulicState, LinkStatus};
pub use network::Network;
pub use objects::{Link, MixingModel, Node, Pattern, Source, SourceKind, Tank};
pub use species::{Kinetics, Species, SpeciesKind};
