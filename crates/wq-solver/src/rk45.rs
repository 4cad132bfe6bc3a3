//! Embedded Runge-Kutta 4(5) with Dormand-Prince coefficients.

use crate::error::{SolverError, SolverResult};
use crate::ode::{OdeIntegrator, OdeTolerances};

const SAFETY: f64 = 0.9;
const SHRINK_LIMIT: f64 = 0.2;
const GROW_LIMIT: f64 = 10.0;
const MAX_STEPS: usize = 10_000;

// Dormand-Prince 4(5) tableau.
const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
// 5th-order solution weights (also row 7 of A).
const B5: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
// Embedded 4th-order weights for the error estimate.
const B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

/// Adaptive Dormand-Prince integrator. Scratch arrays are owned, so one
/// instance serves one worker.
#[derive(Debug, Default)]
pub struct RungeKutta45 {
    k: [Vec<f64>; 7],
    y_stage: Vec<f64>,
    y_new: Vec<f64>,
}

impl RungeKutta45 {
    pub fn new() -> Self {
        Self::default()
    }

    fn resize(&mut self, n: usize) {
        for k in &mut self.k {
            k.resize(n, 0.0);
        }
        self.y_stage.resize(n, 0.0);
        self.y_new.resize(n, 0.0);
    }
}

impl OdeIntegrator for RungeKutta45 {
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
        self.resize(n);

        let span = t1 - t0;
        let mut t = t0;
        let mut h = span;
        let mut evals = 0usize;

        for _ in 0..MAX_STEPS {
            if t >= t1 {
                return Ok(evals);
            }
            h = h.min(t1 - t);
            let h_min = 16.0 * f64::EPSILON * t.abs().max(span);
            if h < h_min {
                return Err(SolverError::StepSizeCollapsed { t });
            }

            // Stage derivatives. The k arrays are split off one at a time
            // so the borrow of the previous stages stays shared.
            rhs(t, y, &mut self.k[0])?;
            for stage in 1..7 {
                let a: &[f64] = match stage {
                    1 => &A2,
                    2 => &A3,
                    3 => &A4,
                    4 => &A5,
                    5 => &A6,
                    _ => &B5,
                };
                for i in 0..n {
                    let mut acc = 0.0;
                    for (j, &aj) in a.iter().enumerate() {
                        acc += aj * self.k[j][i];
                    }
                    self.y_stage[i] = y[i] + h * acc;
                }
                let (before, rest) = self.k.split_at_mut(stage);
                let _ = before;
                rhs(t + C[stage] * h, &self.y_stage, &mut rest[0])?;
            }
            evals += 7;

            // 5th-order candidate and scaled error estimate.
            let mut err: f64 = 0.0;
            for i in 0..n {
                let mut y5 = 0.0;
                let mut y4 = 0.0;
                for j in 0..7 {
                    y5 += B5[j] * self.k[j][i];
                    y4 += B4[j] * self.k[j][i];
                }
                let ynew = y[i] + h * y5;
                self.y_new[i] = ynew;
                let scale = tol.atol[i] + tol.rtol[i] * y[i].abs().max(ynew.abs());
                err = err.max((h * (y5 - y4)).abs() / scale);
            }

            if err <= 1.0 {
                y.copy_from_slice(&self.y_new[..n]);
                t += h;
            }

            // PI-style step update with safety factor and growth clamp.
            let factor = if err > 0.0 {
                (SAFETY * err.powf(-0.2)).clamp(SHRINK_LIMIT, GROW_LIMIT)
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
    fn decay_high_accuracy() {
        let mut rk = RungeKutta45::new();
        check_exponential_decay(&mut rk, 4, 1e-7);
    }

    #[test]
    fn two_species_linear_system() {
        // y0' = -y0, y1' = y0 - y1
        let mut rk = RungeKutta45::new();
        let mut y = vec![1.0, 0.0];
        rk.integrate(
            &mut y,
            0.0,
            1.0,
            OdeTolerances {
                atol: &[1e-10, 1e-10],
                rtol: &[1e-8, 1e-8],
            },
            &mut |_t, y, dydt| {
                dydt[0] = -y[0];
                dydt[1] = y[0] - y[1];
                Ok(())
            },
        )
        .unwrap();
        let e = (-1.0f64).exp();
        assert!((y[0] - e).abs() < 1e-6);
        assert!((y[1] - e).abs() < 1e-6); // t*e^-t at t=1
    }

    #[test]
    fn derivative_error_propagates() {
        let mut rk = RungeKutta45::new();
        let mut y = vec![1.0];
        let err = rk
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
                        what: "kinetics fault".to_string(),
                    })
                },
            )
            .unwrap_err();
        assert!(matches!(err, SolverError::Derivative { .. }));
    }

    #[test]
    fn reports_eval_count() {
        let mut rk = RungeKutta45::new();
        let mut y = vec![1.0];
        let evals = rk
            .integrate(
                &mut y,
                0.0,
                0.1,
                OdeTolerances {
                    atol: &[1e-8],
                    rtol: &[1e-6],
                },
                &mut |_t, y, dydt| {
                    dydt[0] = -y[0];
                    Ok(())
                },
            )
            .unwrap();
        assert!(evals >= 7);
        assert_eq!(evals % 7, 0);
    }
}
