//! Kinetics evaluation strategy.
//!
//! The workers call kinetics through this trait so a precompiled-code
//! backend can be installed at configuration time without touching the
//! reaction drivers. The interpreted bytecode evaluator is the only
//! implementation shipped.

use wq_core::Real;
use wq_express::{Evaluator, MathFault, Program};

pub trait RateEvaluator: Send {
    /// Evaluate one compiled kinetics expression, resolving variables
    /// through `lookup`. Domain faults are latched, not returned.
    fn eval(&mut self, prog: &Program, lookup: &mut dyn FnMut(u32) -> Real) -> Real;

    /// Consume the latched fault, if any; first fault wins.
    fn take_fault(&mut self) -> Option<MathFault>;
}

/// Interpreted kinetics: the wq-express stack evaluator.
#[derive(Debug, Default)]
pub struct ExprRates {
    inner: Evaluator,
}

impl ExprRates {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateEvaluator for ExprRates {
    fn eval(&mut self, prog: &Program, lookup: &mut dyn FnMut(u32) -> Real) -> Real {
        self.inner.eval(prog, lookup)
    }

    fn take_fault(&mut self) -> Option<MathFault> {
        self.inner.take_fault()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wq_express::compile;

    #[test]
    fn interpreted_backend_matches_direct_evaluation() {
        let prog = compile("2 * x + 1", |n| (n == "x").then_some(0)).unwrap();
        let mut rates = ExprRates::new();
        let v = rates.eval(&prog, &mut |_| 3.0);
        assert_eq!(v, 7.0);
        assert!(rates.take_fault().is_none());
    }

    #[test]
    fn fault_latch_passes_through() {
        let prog = compile("log(x)", |n| (n == "x").then_some(0)).unwrap();
        let mut rates = ExprRates::new();
        rates.eval(&prog, &mut |_| 0.0);
        let fault = rates.take_fault().unwrap();
        assert_eq!(fault.op, "log");
    }
}
