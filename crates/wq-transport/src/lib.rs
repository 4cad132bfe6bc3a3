//! wq-transport: the reactive transport engine.
//!
//! Top of the crate stack: owns the Lagrangian segment arena, the tank
//! mixing models, the topological flow ordering, the dispersion engine,
//! and the mass-balance ledger, and drives chemistry, advection, node
//! mixing, source injection, and dispersion each water-quality step.

pub mod dispersion;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod pipeflow;
pub mod segment;
pub mod tanks;
pub mod topology;

pub use dispersion::{effective_coefficient, DispersionEngine};
pub use engine::QualityEngine;
pub use error::{TransportError, TransportResult};
pub use ledger::{MassBalance, SpeciesBalance};
pub use segment::{SegChain, Segment, SegmentArena};
pub use tanks::{mix_tank, TankState};
pub use topology::flow_order;
