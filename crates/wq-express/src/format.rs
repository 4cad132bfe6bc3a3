//! Back-to-source formatting of compiled programs.
//!
//! Used for diagnostics and to check that compilation preserved the
//! formula's meaning: formatting and re-compiling must produce a program
//! that evaluates identically, even if the surface syntax differs.

use crate::compile::{BinOp, Instr, Program, UnaryFn};

// Precedence levels used to decide parenthesization.
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_NEG: u8 = 3;
const PREC_POW: u8 = 4;
const PREC_ATOM: u8 = 5;

/// Render a program back into an equivalent infix formula.
pub fn format_program(prog: &Program) -> String {
    let mut stack: Vec<(String, u8)> = Vec::new();

    for instr in &prog.code {
        match *instr {
            Instr::Const(v) => stack.push((format_const(v), PREC_ATOM)),
            Instr::Var(ix) => stack.push((prog.name_of(ix).to_string(), PREC_ATOM)),
            Instr::Unary(UnaryFn::Neg) => {
                let (a, pa) = stack.pop().unwrap_or_default();
                let inner = if pa < PREC_NEG { paren(&a) } else { a };
                stack.push((format!("-{inner}"), PREC_NEG));
            }
            Instr::Unary(func) => {
                let (a, _) = stack.pop().unwrap_or_default();
                stack.push((format!("{}({a})", func.name()), PREC_ATOM));
            }
            Instr::Binary(op) => {
                let (b, pb) = stack.pop().unwrap_or_default();
                let (a, pa) = stack.pop().unwrap_or_default();
                let (sym, prec, right_strict) = match op {
                    BinOp::Add => ("+", PREC_ADD, false),
                    BinOp::Sub => ("-", PREC_ADD, true),
                    BinOp::Mul => ("*", PREC_MUL, false),
                    BinOp::Div => ("/", PREC_MUL, true),
                    BinOp::Pow => ("^", PREC_POW, false),
                };
                let (left, right) = if op == BinOp::Pow {
                    // right associative: parenthesize an operator on the left
                    let left = if pa <= prec { paren(&a) } else { a };
                    let right = if pb < prec { paren(&b) } else { b };
                    (left, right)
                } else {
                    let left = if pa < prec { paren(&a) } else { a };
                    let right = if pb < prec || (right_strict && pb == prec) {
                        paren(&b)
                    } else {
                        b
                    };
                    (left, right)
                };
                stack.push((format!("{left} {sym} {right}"), prec));
            }
        }
    }

    stack.pop().map(|(s, _)| s).unwrap_or_default()
}

fn paren(s: &str) -> String {
    format!("({s})")
}

fn format_const(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}
