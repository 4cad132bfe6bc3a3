//! Thomas algorithm for tridiagonal systems.

use crate::error::{SolverError, SolverResult};

/// Tridiagonal solver with owned scratch, reused across the three
/// response-function solves per pipe.
#[derive(Debug, Default)]
pub struct TridiagSolver {
    c_prime: Vec<f64>,
}

impl TridiagSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve the system with sub-diagonal `sub`, diagonal `diag`,
    /// super-diagonal `sup`, and right-hand side `rhs` (overwritten with
    /// the solution). `sub[0]` and `sup[n-1]` are ignored.
    pub fn solve(
        &mut self,
        sub: &[f64],
        diag: &[f64],
        sup: &[f64],
        rhs: &mut [f64],
    ) -> SolverResult<()> {
        let n = diag.len();
        if n == 0 {
            return Ok(());
        }
        if sub.len() != n || sup.len() != n || rhs.len() != n {
            return Err(SolverError::InvalidArg {
                what: "tridiagonal bands must have equal length",
            });
        }

        self.c_prime.resize(n, 0.0);

        let mut pivot = diag[0];
        if pivot == 0.0 {
            return Err(SolverError::NonPositivePivot { row: 0 });
        }
        self.c_prime[0] = sup[0] / pivot;
        rhs[0] /= pivot;

        for i in 1..n {
            pivot = diag[i] - sub[i] * self.c_prime[i - 1];
            if pivot == 0.0 {
                return Err(SolverError::NonPositivePivot { row: i });
            }
            self.c_prime[i] = sup[i] / pivot;
            rhs[i] = (rhs[i] - sub[i] * rhs[i - 1]) / pivot;
        }

        for i in (0..n - 1).rev() {
            rhs[i] -= self.c_prime[i] * rhs[i + 1];
        }

        Ok(())
    }
}
