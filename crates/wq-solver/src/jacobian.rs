//! Numerical Jacobians for the equilibrium Newton iteration.
//!
//! Equilibrium expressions are opaque bytecode, so derivatives come from
//! differencing. The perturbation is scaled per variable: concentrations
//! span many orders of magnitude within one system.

use crate::error::SolverResult;
use nalgebra::{DMatrix, DVector};

/// Forward-difference Jacobian: one extra residual evaluation per column.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    mut f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let base = f(x)?;
    let mut jac = DMatrix::zeros(base.len(), x.len());
    let mut probe = x.clone();

    for j in 0..x.len() {
        let h = step(x[j], epsilon);
        probe[j] = x[j] + h;
        let shifted = f(&probe)?;
        probe[j] = x[j];

        jac.column_mut(j).copy_from(&((shifted - &base) / h));
    }
    Ok(jac)
}

/// Central-difference Jacobian: second-order accurate, twice the
/// residual evaluations of the forward form.
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    mut f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let n = x.len();
    let mut probe = x.clone();
    let mut jac = DMatrix::zeros(0, 0);

    for j in 0..n {
        let h = step(x[j], epsilon);
        probe[j] = x[j] + h;
        let ahead = f(&probe)?;
        probe[j] = x[j] - h;
        let behind = f(&probe)?;
        probe[j] = x[j];

        if jac.is_empty() {
            jac = DMatrix::zeros(ahead.len(), n);
        }
        jac.column_mut(j).copy_from(&((ahead - behind) / (2.0 * h)));
    }
    Ok(jac)
}

/// Perturbation for one variable: relative to its magnitude, floored so
/// a zero concentration still gets a finite step.
fn step(xj: f64, epsilon: f64) -> f64 {
    epsilon * xj.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupled(x: &DVector<f64>) -> SolverResult<DVector<f64>> {
        // f0 = x0^2 - x1, f1 = 3 x1
        Ok(DVector::from_vec(vec![x[0] * x[0] - x[1], 3.0 * x[1]]))
    }

    #[test]
    fn forward_matches_analytic_derivatives() {
        let x = DVector::from_vec(vec![2.0, 5.0]);
        let jac = finite_difference_jacobian(&x, coupled, 1e-7).unwrap();
        assert!((jac[(0, 0)] - 4.0).abs() < 1e-5);
        assert!((jac[(0, 1)] + 1.0).abs() < 1e-5);
        assert!((jac[(1, 0)]).abs() < 1e-5);
        assert!((jac[(1, 1)] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn central_is_tighter_on_curvature() {
        let quad = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] * x[0]))
        };
        let x = DVector::from_element(1, 1.5);
        let fwd = finite_difference_jacobian(&x, quad, 1e-5).unwrap();
        let ctr = central_difference_jacobian(&x, quad, 1e-5).unwrap();
        let exact = 3.0 * 1.5 * 1.5;
        assert!((ctr[(0, 0)] - exact).abs() <= (fwd[(0, 0)] - exact).abs());
    }

    #[test]
    fn zero_state_still_perturbs() {
        let x = DVector::from_element(1, 0.0);
        let jac = finite_difference_jacobian(
            &x,
            |x: &DVector<f64>| Ok(DVector::from_element(1, 2.0 * x[0])),
            1e-7,
        )
        .unwrap();
        assert!((jac[(0, 0)] - 2.0).abs() < 1e-5);
    }
}
