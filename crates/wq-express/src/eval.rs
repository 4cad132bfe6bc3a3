//! Stack-based evaluation of compiled programs.

use crate::compile::{BinOp, Instr, Program, UnaryFn};

/// A latched math domain fault: which operation misbehaved and on what value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MathFault {
    pub op: &'static str,
    pub value: f64,
}

/// Owns the value stack and the fault latch for one evaluation context.
///
/// Each chemistry worker keeps its own `Evaluator`, so evaluations are
/// re-entrant across the parallel reaction loops with no shared state.
#[derive(Debug, Default)]
pub struct Evaluator {
    stack: Vec<f64>,
    fault: Option<MathFault>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the latched fault, if any. The first fault recorded since
    /// the previous `take_fault` call wins; later ones are dropped.
    pub fn take_fault(&mut self) -> Option<MathFault> {
        self.fault.take()
    }

    fn latch(&mut self, op: &'static str, value: f64) -> f64 {
        if self.fault.is_none() {
            self.fault = Some(MathFault { op, value });
        }
        0.0
    }

    /// Evaluate `prog`, resolving variables through `lookup`.
    ///
    /// Domain errors substitute 0 and latch a fault instead of aborting,
    /// so a whole reaction step can finish and report one fault.
    pub fn eval<F>(&mut self, prog: &Program, mut lookup: F) -> f64
    where
        F: FnMut(u32) -> f64,
    {
        self.stack.clear();
        for instr in &prog.code {
            match *instr {
                Instr::Const(v) => self.stack.push(v),
                Instr::Var(ix) => self.stack.push(lookup(ix)),
                Instr::Unary(func) => {
                    let a = self.stack.pop().unwrap_or(0.0);
                    let v = self.apply_unary(func, a);
                    self.stack.push(v);
                }
                Instr::Binary(op) => {
                    let b = self.stack.pop().unwrap_or(0.0);
                    let a = self.stack.pop().unwrap_or(0.0);
                    let v = self.apply_binary(op, a, b);
                    self.stack.push(v);
                }
            }
        }
        let result = self.stack.pop().unwrap_or(0.0);
        if result.is_finite() {
            result
        } else {
            self.latch("result", result)
        }
    }

    fn apply_unary(&mut self, func: UnaryFn, a: f64) -> f64 {
        match func {
            UnaryFn::Neg => -a,
            UnaryFn::Sin => a.sin(),
            UnaryFn::Cos => a.cos(),
            UnaryFn::Tan => a.tan(),
            UnaryFn::Cot => {
                let s = a.sin();
                if s == 0.0 {
                    self.latch("cot", a)
                } else {
                    a.cos() / s
                }
            }
            UnaryFn::Asin => {
                if a.abs() > 1.0 {
                    self.latch("asin", a)
                } else {
                    a.asin()
                }
            }
            UnaryFn::Acos => {
                if a.abs() > 1.0 {
                    self.latch("acos", a)
                } else {
                    a.acos()
                }
            }
            UnaryFn::Atan => a.atan(),
            UnaryFn::Acot => std::f64::consts::FRAC_PI_2 - a.atan(),
            UnaryFn::Sinh => a.sinh(),
            UnaryFn::Cosh => a.cosh(),
            UnaryFn::Tanh => a.tanh(),
            UnaryFn::Coth => {
                let t = a.tanh();
                if t == 0.0 {
                    self.latch("coth", a)
                } else {
                    1.0 / t
                }
            }
            UnaryFn::Exp => a.exp(),
            UnaryFn::Log => {
                if a <= 0.0 {
                    self.latch("log", a)
                } else {
                    a.ln()
                }
            }
            UnaryFn::Log10 => {
                if a <= 0.0 {
                    self.latch("log10", a)
                } else {
                    a.log10()
                }
            }
            UnaryFn::Sqrt => {
                if a < 0.0 {
                    self.latch("sqrt", a)
                } else {
                    a.sqrt()
                }
            }
            UnaryFn::Abs => a.abs(),
            UnaryFn::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            UnaryFn::Step => {
                if a > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn apply_binary(&mut self, op: BinOp, a: f64, b: f64) -> f64 {
        match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => {
                if b == 0.0 {
                    self.latch("div", a)
                } else {
                    a / b
                }
            }
            BinOp::Pow => {
                if a == 0.0 && b < 0.0 {
                    return self.latch("pow", b);
                }
                // A negative base with a non-integer exponent has no real
                // value; it evaluates to 0 with the fault latched.
                if a < 0.0 && b.fract() != 0.0 {
                    return self.latch("pow", a);
                }
                a.powf(b)
            }
        }
    }
}
