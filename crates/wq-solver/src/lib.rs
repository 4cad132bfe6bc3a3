//! wq-solver: numerical kernels for the reactive transport engine.
//!
//! - Newton-Raphson with finite-difference Jacobian (equilibrium chemistry)
//! - three interchangeable ODE integrators (rate chemistry)
//! - Thomas tridiagonal solver (per-pipe dispersion responses)
//! - sparse symmetric Cholesky with minimum-degree ordering (nodal
//!   dispersion system)
//!
//! Every solver is an owned value with its own scratch buffers, so the
//! parallel reaction loops construct one per worker and never share
//! mutable state.

pub mod error;
pub mod euler;
pub mod jacobian;
pub mod newton;
pub mod ode;
pub mod rk45;
pub mod rosenbrock;
pub mod sparse;
pub mod tridiag;

pub use error::{SolverError, SolverResult};
pub use euler::ExplicitEuler;
pub use jacobian::{central_difference_jacobian, finite_difference_jacobian};
pub use newton::{NewtonConfig, NewtonSolver};
pub use ode::{new_integrator, OdeIntegrator, OdeTolerances};
pub use rk45::RungeKutta45;
pub use rosenbrock::Rosenbrock2;
pub use sparse::SparseSymSolver;
pub use tridiag::TridiagSolver;
