//! Common interface for the rate-kinetics integrators.

use crate::error::SolverResult;
use crate::euler::ExplicitEuler;
use crate::rk45::RungeKutta45;
use crate::rosenbrock::Rosenbrock2;
use wq_core::IntegratorChoice;

/// Per-variable absolute/relative tolerances.
#[derive(Clone, Copy, Debug)]
pub struct OdeTolerances<'a> {
    pub atol: &'a [f64],
    pub rtol: &'a [f64],
}

/// Integrate y' = f(t, y) from `t0` to `t1` in place.
///
/// The derivative callback writes into its output slice and may fail
/// (expression faults propagate through it). Implementations own all of
/// their scratch arrays: one integrator instance must never be shared
/// between concurrently progressing reaction tasks.
pub trait OdeIntegrator: Send {
    /// Returns the number of derivative evaluations performed.
    fn integrate(
        &mut self,
        y: &mut [f64],
        t0: f64,
        t1: f64,
        tol: OdeTolerances,
        rhs: &mut dyn FnMut(f64, &[f64], &mut [f64]) -> SolverResult<()>,
    ) -> SolverResult<usize>;
}

/// Construct the integrator selected in the global options.
pub fn new_integrator(choice: IntegratorChoice) -> Box<dyn OdeIntegrator> {
    match choice {
        IntegratorChoice::Euler => Box::new(ExplicitEuler::new()),
        IntegratorChoice::RungeKutta => Box::new(RungeKutta45::new()),
        IntegratorChoice::Rosenbrock => Box::new(Rosenbrock2::new()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Integrate dc/dt = -k c over one interval and check against the
    /// exact solution. Shared by the per-integrator test modules.
    pub fn check_exponential_decay(integrator: &mut dyn OdeIntegrator, steps: usize, tol: f64) {
        let k = 0.3;
        let dt = 0.5;
        let mut y = vec![2.0];
        let atol = [1e-10];
        let rtol = [1e-8];

        let mut t = 0.0;
        for _ in 0..steps {
            integrator
                .integrate(
                    &mut y,
                    t,
                    t + dt,
                    OdeTolerances {
                        atol: &atol,
                        rtol: &rtol,
                    },
                    &mut |_t, y, dydt| {
                        dydt[0] = -k * y[0];
                        Ok(())
                    },
                )
                .unwrap();
            t += dt;
        }

        let exact = 2.0 * (-k * t).exp();
        assert!(
            (y[0] - exact).abs() < tol,
            "decay mismatch: got {}, want {exact}",
            y[0]
        );
    }
}
