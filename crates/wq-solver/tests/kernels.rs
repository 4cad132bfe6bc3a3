//! The kernels as the chemistry engine drives them: integrators picked
//! through the factory, Newton through its public API.

use nalgebra::DVector;
use wq_core::IntegratorChoice;
use wq_solver::{new_integrator, NewtonConfig, NewtonSolver, OdeTolerances};

/// Sequential decay A -> B -> out: y0' = -k1 y0, y1' = k1 y0 - k2 y1.
/// Closed form for y1 with k1 != k2.
fn sequential_exact(t: f64, a0: f64, k1: f64, k2: f64) -> (f64, f64) {
    let a = a0 * (-k1 * t).exp();
    let b = a0 * k1 / (k2 - k1) * ((-k1 * t).exp() - (-k2 * t).exp());
    (a, b)
}

#[test]
fn every_integrator_tracks_a_coupled_decay_chain() {
    let (k1, k2) = (0.4, 0.1);
    let a0 = 5.0;
    let dt = 0.25;
    let steps = 40;
    let atol = [1e-10, 1e-10];
    let rtol = [1e-8, 1e-8];

    for (choice, tol) in [
        // Euler takes one fixed step per call, so its error is O(dt)
        (IntegratorChoice::Euler, 0.1),
        (IntegratorChoice::RungeKutta, 1e-6),
        (IntegratorChoice::Rosenbrock, 1e-4),
    ] {
        let mut integrator = new_integrator(choice);
        let mut y = vec![a0, 0.0];
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
                        dydt[0] = -k1 * y[0];
                        dydt[1] = k1 * y[0] - k2 * y[1];
                        Ok(())
                    },
                )
                .unwrap();
            t += dt;
        }

        let (a, b) = sequential_exact(t, a0, k1, k2);
        assert!(
            (y[0] - a).abs() < tol && (y[1] - b).abs() < tol,
            "{choice:?}: got ({}, {}), want ({a}, {b})",
            y[0],
            y[1]
        );
    }
}

#[test]
fn newton_solves_a_linear_equation_in_at_most_two_iterations() {
    let solver = NewtonSolver::new(NewtonConfig::default());
    let mut x = DVector::from_element(1, 0.0);
    let iters = solver
        .solve(&mut x, |x| {
            Ok(DVector::from_element(1, 3.0 * x[0] - 12.0))
        })
        .unwrap();
    assert!(iters <= 2, "took {iters} iterations");
    assert!((x[0] - 4.0).abs() < 1e-5);
}

#[test]
fn newton_reaches_an_equilibrium_the_chemistry_engine_poses() {
    // HOCl <-> H+ + OCl-, reduced to one unknown: f(x) = x^2 / (c - x) - ka
    let ka = 2.9e-8;
    let c = 1e-4;
    let solver = NewtonSolver::new(NewtonConfig::default());
    let mut x = DVector::from_element(1, c * 0.5);
    solver
        .solve(&mut x, |x| {
            Ok(DVector::from_element(1, x[0] * x[0] / (c - x[0]) - ka))
        })
        .unwrap();
    let root = x[0];
    assert!(root > 0.0 && root < c);
    assert!((root * root / (c - root) - ka).abs() < ka * 1e-4);
}
