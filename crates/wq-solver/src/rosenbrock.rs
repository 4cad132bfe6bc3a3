//! Linearly-implicit Rosenbrock 2(1) for stiff kinetics.

use crate::error::{SolverError, SolverResult};
use crate::ode::{OdeIntegrator, OdeTolerances};
use nalgebra::{DMatrix, DVector};

const SAFETY: f64 = 0.9;
const SHRINK_LIMIT: f64 = 0.2;
const GROW_LIMIT: f64 = 10.0;
const MAX_STEPS: usize = 10_000;

// gamma = 1 + 1/sqrt(2) gives L-stability for the two-stage scheme.
const GAMMA: f64 = 1.0 + std::f64::consts::FRAC_1_SQRT_2;

/// Two-stage Rosenbrock method with an embedded first-order error
/// estimate. Each step solves two linear systems with the same
/// factorization of (I - gamma*h*J); the Jacobian is refreshed only
/// after an accepted step and reused across rejections.
#[derive(Debug, Default)]
pub struct Rosenbrock2 {
    jac: DMatrix<f64>,
    f0: Vec<f64>,
    f1: Vec<f64>,
    y_stage: Vec<f64>,
    fd_scratch: Vec<f64>,
}

impl Rosenbrock2 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward-difference Jacobian of the derivative callback at (t, y).
    fn numeric_jacobian(
        &mut self,
        t: f64,
        y: &mut [f64],
        rhs: &mut dyn FnMut(f64, &[f64], &mut [f64]) -> SolverResult<()>,
    ) -> SolverResult<usize> {
        let n = y.len();
        rhs(t, y, &mut self.f0)?;
        let mut evals = 1;
        for j in 0..n {
            let orig = y[j];
            let dy = 1e-7 * orig.abs().max(1.0);
            y[j] = orig + dy;
            rhs(t, y, &mut self.fd_scratch)?;
            y[j] = orig;
            evals += 1;
            for i in 0..n {
                self.jac[(i, j)] = (self.fd_scratch[i] - self.f0[i]) / dy;
            }
        }
        Ok(evals)
    }
}

impl OdeIntegrator for Rosenbrock2 {
    fn integrate(
        &mut self,
        y: &mut [f64],
        t0: f64,
        t1: f64,
        tol: OdeTolerances,
        rhs: &mut dyn FnMut(f64, &[f64], &mut [f64]) -> SolverResult<()>,
    ) -> SolverResult<usize> {
        let n = y.len();
        if t1 <= t0 {
            return Err(SolverError::InvalidArg {
                what: "integration interval must be forward in time",
            });
        }
        if self.jac.nrows() != n {
            self.jac = DMatrix::zeros(n, n);
        }
        self.f0.resize(n, 0.0);
        self.f1.resize(n, 0.0);
        self.y_stage.resize(n, 0.0);
        self.fd_scratch.resize(n, 0.0);

        let span = t1 - t0;
        let mut t = t0;
        let mut h = span;
        let mut evals = 0usize;
        let mut jac_stale = true;

        for _ in 0..MAX_STEPS {
            if t >= t1 {
                return Ok(evals);
            }
            h = h.min(t1 - t);
            let h_min = 16.0 * f64::EPSILON * t.abs().max(span);
            if h < h_min {
                return Err(SolverError::StepSizeCollapsed { t });
            }

            if jac_stale {
                evals += self.numeric_jacobian(t, y, rhs)?;
                jac_stale = false;
            } else {
                rhs(t, y, &mut self.f0)?;
                evals += 1;
            }

            // W = I - gamma*h*J, shared by both stages.
            let mut w = self.jac.clone();
            w *= -GAMMA * h;
            for i in 0..n {
                w[(i, i)] += 1.0;
            }
            let lu = w.lu();

            let k1 = lu
                .solve(&DVector::from_column_slice(&self.f0))
                .ok_or(SolverError::SingularJacobian)?;

            for i in 0..n {
                self.y_stage[i] = y[i] + h * k1[i];
            }
            rhs(t + h, &self.y_stage, &mut self.f1)?;
            evals += 1;

            let stage2_rhs =
                DVector::from_iterator(n, self.f1.iter().zip(k1.iter()).map(|(f, k)| f - 2.0 * k));
            let k2 = lu
                .solve(&stage2_rhs)
                .ok_or(SolverError::SingularJacobian)?;

            // Second-order candidate and first-order error estimate.
            let mut err: f64 = 0.0;
            for i in 0..n {
                let ynew = y[i] + h * (1.5 * k1[i] + 0.5 * k2[i]);
                self.y_stage[i] = ynew;
                let e = (0.5 * h * (k1[i] + k2[i])).abs();
                let scale = tol.atol[i] + tol.rtol[i] * y[i].abs().max(ynew.abs());
                err = err.max(e / scale);
            }

            if err <= 1.0 {
                y.copy_from_slice(&self.y_stage[..n]);
                t += h;
                jac_stale = true;
            }

            let factor = if err > 0.0 {
                (SAFETY * err.powf(-0.5)).clamp(SHRINK_LIMIT, GROW_LIMIT)
            } else {
                GROW_LIMIT
            };
            h *= factor;
        }

        if t >= t1 {
            Ok(evals)
        } else {
            Err(SolverError::ConvergenceFailed { iterations: MAX_STEPS })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode::testing::check_exponential_decay;

    #[test]
    fn decay_accuracy() {
        let mut ros = Rosenbrock2::new();
        check_exponential_decay(&mut ros, 4, 1e-4);
    }

    #[test]
    fn stiff_decay_finishes() {
        // dc/dt = -1000 (c - cos(t)); explicit methods would need tiny steps.
        let mut ros = Rosenbrock2::new();
        let mut y = vec![0.0];
        ros.integrate(
            &mut y,
            0.0,
            1.0,
            OdeTolerances {
                atol: &[1e-8],
                rtol: &[1e-6],
            },
            &mut |t, y, dydt| {
                dydt[0] = -1000.0 * (y[0] - t.cos());
                Ok(())
            },
        )
        .unwrap();
        // Solution hugs cos(t) after the fast transient.
        assert!((y[0] - 1.0f64.cos()).abs() < 1e-2);
    }

    #[test]
    fn derivative_error_propagates() {
        let mut ros = Rosenbrock2::new();
        let mut y = vec![1.0];
        let err = ros
            .integrate(
                &mut y,
                0.0,
                1.0,
                OdeTolerances {
                    atol: &[1e-8],
                    rtol: &[1e-6],
                },
                &mut |_t, _y, _dydt| {
                    Err(SolverError::Derivative {
                        what: "fault".to_string(),
                    })
                },
            )
            .unwrap_err();
        assert!(matches!(err, SolverError::Derivative { .. }));
    }
}
