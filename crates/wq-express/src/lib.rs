//! wq-express: kinetic expression engine.
//!
//! Compiles a textual kinetic formula straight into a flat postfix
//! instruction vector and evaluates it with a small value stack. There is
//! no intermediate tree: the recursive-descent compiler emits bytecode as
//! it parses, which keeps evaluation allocation-free and re-entrant for
//! the parallel reaction loops.
//!
//! Domain errors during evaluation (negative sqrt, log of a non-positive
//! value, division by zero, ...) do not abort evaluation: the offending
//! operation yields 0 and a fault is latched on the evaluator. The first
//! fault wins; the chemistry engine consumes it once per reaction step.

pub mod compile;
pub mod error;
pub mod eval;
pub mod format;
pub mod token;

pub use compile::{compile, Program};
pub use error::{ExprError, ExprResult};
pub use eval::{Evaluator, MathFault};
pub use format::format_program;
