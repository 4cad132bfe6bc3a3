//! Newton-Raphson solver for equilibrium chemistry.

use crate::error::{SolverError, SolverResult};
use crate::jacobian::finite_difference_jacobian;
use nalgebra::DVector;

/// Newton solver configuration.
#[derive(Clone, Copy, Debug)]
pub struct NewtonConfig {
    /// Largest system the solver will accept.
    pub capacity: usize,
    /// Maximum iterations
    pub max_iterations: usize,
    /// Requested significant digits; relative tolerance is 10^-digits.
    pub digits: u32,
    /// Perturbation scale for the finite-difference Jacobian.
    pub fd_epsilon: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_iterations: 100,
            digits: 5,
            fd_epsilon: 1e-7,
        }
    }
}

/// Newton-Raphson with a numerically approximated Jacobian.
///
/// One instance per chemistry worker; the configuration is fixed at
/// construction and the instance is reused across segments.
#[derive(Clone, Debug)]
pub struct NewtonSolver {
    config: NewtonConfig,
}

impl NewtonSolver {
    pub fn new(config: NewtonConfig) -> Self {
        Self { config }
    }

    /// Solve F(x) = 0 in place, returning the iteration count on success.
    ///
    /// Convergence is measured as the worst-case relative step
    /// `max_i |dx_i| / max(|x_i|, tol)` with `tol = 10^-digits`.
    pub fn solve<F>(&self, x: &mut DVector<f64>, mut residual: F) -> SolverResult<usize>
    where
        F: FnMut(&DVector<f64>) -> SolverResult<DVector<f64>>,
    {
        let n = x.len();
        if n == 0 {
            return Ok(0);
        }
        if n > self.config.capacity {
            return Err(SolverError::OversizeSystem {
                size: n,
                capacity: self.config.capacity,
            });
        }

        let tol = 10f64.powi(-(self.config.digits as i32));

        for iter in 1..=self.config.max_iterations {
            let jac = finite_difference_jacobian(x, &mut residual, self.config.fd_epsilon)?;
            let r = residual(x)?;

            let dx = jac
                .lu()
                .solve(&(-r))
                .ok_or(SolverError::SingularJacobian)?;

            *x += &dx;

            let mut rel_err: f64 = 0.0;
            for i in 0..n {
                let scale = x[i].abs().max(tol);
                rel_err = rel_err.max(dx[i].abs() / scale);
            }

            if rel_err < tol {
                return Ok(iter);
            }
        }

        tracing::debug!(
            max_iterations = self.config.max_iterations,
            "Newton iteration budget exhausted"
        );
        Err(SolverError::ConvergenceFailed {
            iterations: self.config.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_equation_converges_fast() {
        // a*x = b with a=2, b=6: one Newton step lands on the root.
        let solver = NewtonSolver::new(NewtonConfig::default());
        let mut x = DVector::from_element(1, 0.0);
        let iters = solver
            .solve(&mut x, |x| Ok(DVector::from_element(1, 2.0 * x[0] - 6.0)))
            .unwrap();
        assert!(iters <= 2);
        assert!((x[0] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn quadratic_root() {
        let solver = NewtonSolver::new(NewtonConfig::default());
        let mut x = DVector::from_element(1, 3.0);
        solver
            .solve(&mut x, |x| {
                Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
            })
            .unwrap();
        assert!((x[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn coupled_system() {
        // x + y = 3, x*y = 2  ->  (1, 2) or (2, 1)
        let solver = NewtonSolver::new(NewtonConfig::default());
        let mut x = DVector::from_vec(vec![0.5, 2.5]);
        solver
            .solve(&mut x, |v| {
                Ok(DVector::from_vec(vec![
                    v[0] + v[1] - 3.0,
                    v[0] * v[1] - 2.0,
                ]))
            })
            .unwrap();
        assert!((x[0] * x[1] - 2.0).abs() < 1e-4);
        assert!((x[0] + x[1] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn oversize_system_rejected() {
        let solver = NewtonSolver::new(NewtonConfig {
            capacity: 2,
            ..Default::default()
        });
        let mut x = DVector::zeros(3);
        let err = solver.solve(&mut x, |x| Ok(x.clone())).unwrap_err();
        assert!(matches!(
            err,
            SolverError::OversizeSystem {
                size: 3,
                capacity: 2
            }
        ));
    }

    #[test]
    fn singular_jacobian_reported() {
        // Residual independent of x: Jacobian is all zeros.
        let solver = NewtonSolver::new(NewtonConfig::default());
        let mut x = DVector::from_element(1, 1.0);
        let err = solver
            .solve(&mut x, |_| Ok(DVector::from_element(1, 1.0)))
            .unwrap_err();
        assert_eq!(err, SolverError::SingularJacobian);
    }

    #[test]
    fn no_root_exhausts_budget() {
        let solver = NewtonSolver::new(NewtonConfig {
            max_iterations: 5,
            ..Default::default()
        });
        // x^2 + 1 = 0 has no real root.
        let mut x = DVector::from_element(1, 0.7);
        let err = solver
            .solve(&mut x, |x| {
                Ok(DVector::from_element(1, x[0] * x[0] + 1.0))
            })
            .unwrap_err();
        assert!(matches!(err, SolverError::ConvergenceFailed { .. }));
    }
}
