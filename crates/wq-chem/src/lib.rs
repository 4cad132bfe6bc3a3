//! wq-chem: chemistry engine.
//!
//! Classifies species into rate / equilibrium / formula groups per pipe
//! and per tank at setup, then drives the ODE integrators, the Newton
//! equilibrium solver, and the expression evaluator for every segment at
//! every water-quality step. Each worker owns its solvers and evaluator,
//! so the transport engine can run one worker per thread over
//! independent pipes.

pub mod classify;
pub mod error;
pub mod rates;
pub mod vars;
pub mod worker;

pub use classify::{classify, Classification, SpeciesGroups};
pub use error::{ChemError, ChemResult};
pub use rates::{ExprRates, RateEvaluator};
pub use vars::{lookup_var, make_resolver, HydVar, ParamTable, SegEnv, HYD_BASE, PARAM_BASE};
pub use worker::{ChemWorker, ElementKind};
