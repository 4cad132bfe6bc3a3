//! Global water-quality solver options.

use crate::numeric::Real;
use crate::{WqError, WqResult};

/// ODE integrator family used for rate kinetics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntegratorChoice {
    /// Explicit Euler: one fixed step, no error control.
    Euler,
    /// Embedded Runge-Kutta 4(5), adaptive (default).
    #[default]
    RungeKutta,
    /// Linearly-implicit Rosenbrock 2(1), for stiff kinetics.
    Rosenbrock,
}

/// How tightly rate and equilibrium species are coupled during integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Coupling {
    /// Equilibria solved once after each rate integration step.
    #[default]
    None,
    /// Equilibria re-solved inside every rate derivative evaluation.
    Full,
}

/// Options governing a water-quality run.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityOptions {
    /// Water-quality time step (seconds).
    pub dt: Real,
    /// Integrator for rate species.
    pub integrator: IntegratorChoice,
    /// Rate/equilibrium coupling mode.
    pub coupling: Coupling,
    /// Default absolute tolerance for species without their own.
    pub abs_tol: Real,
    /// Default relative tolerance for species without their own.
    pub rel_tol: Real,
    /// Pipes whose Peclet number exceeds this skip the dispersion solve.
    pub peclet_limit: Real,
    /// Maximum segments held per pipe; inflow merges beyond this.
    pub max_segments: usize,
    /// Flows with magnitude below this are treated as stagnant (m^3/s).
    pub stagnant_flow: Real,
    /// Newton iteration budget for equilibrium solves.
    pub newton_max_iter: usize,
    /// Significant digits requested of the Newton solver.
    pub newton_digits: u32,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            dt: 60.0,
            integrator: IntegratorChoice::default(),
            coupling: Coupling::default(),
            abs_tol: 1e-8,
            rel_tol: 1e-4,
            peclet_limit: 1e4,
            max_segments: 100,
            stagnant_flow: 1e-8,
            newton_max_iter: 100,
            newton_digits: 5,
        }
    }
}

impl QualityOptions {
    /// Reject options that would make the stepper loop forever or divide by zero.
    pub fn validate(&self) -> WqResult<()> {
        if self.dt <= 0.0 {
            return Err(WqError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if self.max_segments < 2 {
            return Err(WqError::InvalidArg {
                what: "max_segments must be at least 2",
            });
        }
        if self.newton_max_iter == 0 {
            return Err(WqError::InvalidArg {
                what: "newton_max_iter must be positive",
            });
        }
        if self.abs_tol <= 0.0 || self.rel_tol <= 0.0 {
            return Err(WqError::InvalidArg {
                what: "tolerances must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        QualityOptions::default().validate().unwrap();
    }

    #[test]
    fn zero_dt_rejected() {
        let opts = QualityOptions {
            dt: 0.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
