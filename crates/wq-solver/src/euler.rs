//! Explicit Euler: one fixed step, no error estimate.

use crate::error::SolverResult;
use crate::ode::{OdeIntegrator, OdeTolerances};

/// The cheapest integrator; used when stiffness and accuracy are not a
/// concern. Takes the whole interval as a single step.
#[derive(Debug, Default)]
pub struct ExplicitEuler {
    dydt: Vec<f64>,
}

impl ExplicitEuler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OdeIntegrator for ExplicitEuler {
    fn integrate(
        &mut self,
        y: &mut [f64],
        t0: f64,
        t1: f64,
        _tol: OdeTolerances,
        rhs: &mut dyn FnMut(f64, &[f64], &mut [f64]) -> SolverResult<()>,
    ) -> SolverResult<usize> {
        let h = t1 - t0;
        self.dydt.resize(y.len(), 0.0);
        rhs(t0, y, &mut self.dydt)?;
        for (yi, di) in y.iter_mut().zip(&self.dydt) {
            *yi += h * di;
        }
        Ok(1)
    }
}
