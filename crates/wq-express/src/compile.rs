//! Recursive-descent compiler emitting flat postfix bytecode.

use crate::error::{ExprError, ExprResult};
use crate::token::{tokenize, Spanned, Token};

/// Named unary function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryFn {
    Neg,
    Sin,
    Cos,
    Tan,
    Cot,
    Asin,
    Acos,
    Atan,
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Coth,
    Exp,
    Log,
    Log10,
    Sqrt,
    Abs,
    Sign,
    Step,
}

impl UnaryFn {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Some(match lower.as_str() {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "cot" => Self::Cot,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "acot" => Self::Acot,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "coth" => Self::Coth,
            "exp" => Self::Exp,
            "log" | "ln" => Self::Log,
            "log10" => Self::Log10,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "sign" | "sgn" => Self::Sign,
            "step" => Self::Step,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Cot => "cot",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Acot => "acot",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Coth => "coth",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log10 => "log10",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Sign => "sign",
            Self::Step => "step",
        }
    }
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// One postfix instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    Const(f64),
    /// Load a variable by the caller-assigned index.
    Var(u32),
    Unary(UnaryFn),
    Binary(BinOp),
}

/// A compiled formula: postfix code plus the variable names seen, kept
/// for diagnostics and the round-trip formatter.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub code: Vec<Instr>,
    /// (variable index, source name) pairs in order of first use.
    pub names: Vec<(u32, String)>,
}

impl Program {
    pub fn name_of(&self, var: u32) -> &str {
        self.names
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, n)| n.as_str())
            .unwrap_or("?")
    }
}

/// Compile `source` into a postfix program. `resolve` maps each identifier
/// that is not a function name to a variable index (species, parameter,
/// constant, or hydraulic variable — the caller owns the namespace).
pub fn compile<F>(source: &str, mut resolve: F) -> ExprResult<Program>
where
    F: FnMut(&str) -> Option<u32>,
{
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        prog: Program::default(),
        resolve: &mut resolve,
    };
    parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(ExprError::UnexpectedToken {
            pos: tok.pos,
            found: format!("{:?}", tok.token),
        });
    }
    Ok(parser.prog)
}

struct Parser<'a, F> {
    tokens: &'a [Spanned],
    pos: usize,
    prog: Program,
    resolve: &'a mut F,
}

impl<'a, F> Parser<'a, F>
where
    F: FnMut(&str) -> Option<u32>,
{
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> ExprResult<&Spanned> {
        let tok = self.tokens.get(self.pos).ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: Token) -> ExprResult<()> {
        let tok = self.next()?;
        if tok.token == want {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                pos: tok.pos,
                found: format!("{:?}", tok.token),
            })
        }
    }

    // expr := term (('+'|'-') term)*
    fn expr(&mut self) -> ExprResult<()> {
        self.term()?;
        while let Some(tok) = self.peek() {
            let op = match tok.token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.term()?;
            self.prog.code.push(Instr::Binary(op));
        }
        Ok(())
    }

    // term := factor (('*'|'/') factor)*
    fn term(&mut self) -> ExprResult<()> {
        self.factor()?;
        while let Some(tok) = self.peek() {
            let op = match tok.token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            self.factor()?;
            self.prog.code.push(Instr::Binary(op));
        }
        Ok(())
    }

    // factor := '-' factor | power
    //
    // Unary minus binds looser than '^', so "-x^2" means "-(x^2)".
    fn factor(&mut self) -> ExprResult<()> {
        if let Some(tok) = self.peek() {
            if tok.token == Token::Minus {
                self.pos += 1;
                self.factor()?;
                self.prog.code.push(Instr::Unary(UnaryFn::Neg));
                return Ok(());
            }
        }
        self.power()
    }

    // power := atom ('^' factor)?   (right associative)
    fn power(&mut self) -> ExprResult<()> {
        self.atom()?;
        if let Some(tok) = self.peek() {
            if tok.token == Token::Caret {
                self.pos += 1;
                self.factor()?;
                self.prog.code.push(Instr::Binary(BinOp::Pow));
            }
        }
        Ok(())
    }

    // atom := Num | Ident | Ident '(' expr ')' | '(' expr ')'
    fn atom(&mut self) -> ExprResult<()> {
        let tok = self.next()?.clone();
        match tok.token {
            Token::Num(v) => {
                self.prog.code.push(Instr::Const(v));
                Ok(())
            }
            Token::LParen => {
                self.expr()?;
                self.expect(Token::RParen)
            }
            Token::Ident(name) => {
                let is_call = matches!(
                    self.peek(),
                    Some(Spanned {
                        token: Token::LParen,
                        ..
                    })
                );
                if is_call {
                    let func =
                        UnaryFn::from_name(&name).ok_or_else(|| ExprError::UnknownFunction {
                            pos: tok.pos,
                            name: name.clone(),
                        })?;
                    self.pos += 1; // consume '('
                    self.expr()?;
                    self.expect(Token::RParen)?;
                    self.prog.code.push(Instr::Unary(func));
                    Ok(())
                } else {
                    let var =
                        (self.resolve)(&name).ok_or_else(|| ExprError::UnknownVariable {
                            pos: tok.pos,
                            name: name.clone(),
                        })?;
                    if !self.prog.names.iter().any(|(v, _)| *v == var) {
                        self.prog.names.push((var, name));
                    }
                    self.prog.code.push(Instr::Var(var));
                    Ok(())
                }
            }
            other => Err(ExprError::UnexpectedToken {
                pos: tok.pos,
                found: format!("{other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(name: &str) -> Option<u32> {
        match name {
            "x" => Some(0),
            "y" => Some(1),
            "k" => Some(2),
            _ => None,
        }
    }

    #[test]
    fn compile_precedence() {
        let p = compile("x + y * k", resolver).unwrap();
        assert_eq!(
            p.code,
            vec![
                Instr::Var(0),
                Instr::Var(1),
                Instr::Var(2),
                Instr::Binary(BinOp::Mul),
                Instr::Binary(BinOp::Add),
            ]
        );
    }

    #[test]
    fn unary_minus_below_pow() {
        // -x^2 must compile as -(x^2): pow emitted before neg
        let p = compile("-x^2", resolver).unwrap();
        assert_eq!(
            p.code,
            vec![
                Instr::Var(0),
                Instr::Const(2.0),
                Instr::Binary(BinOp::Pow),
                Instr::Unary(UnaryFn::Neg),
            ]
        );
    }

    #[test]
    fn pow_right_associative() {
        let p = compile("x^y^k", resolver).unwrap();
        assert_eq!(
            p.code,
            vec![
                Instr::Var(0),
                Instr::Var(1),
                Instr::Var(2),
                Instr::Binary(BinOp::Pow),
                Instr::Binary(BinOp::Pow),
            ]
        );
    }

    #[test]
    fn function_call() {
        let p = compile("exp(-k * x)", resolver).unwrap();
        assert_eq!(*p.code.last().unwrap(), Instr::Unary(UnaryFn::Exp));
    }

    #[test]
    fn unknown_variable_reported() {
        let err = compile("zz + 1", resolver).unwrap_err();
        assert!(matches!(err, ExprError::UnknownVariable { .. }));
    }

    #[test]
    fn unknown_function_reported() {
        let err = compile("frob(x)", resolver).unwrap_err();
        assert!(matches!(err, ExprError::UnknownFunction { .. }));
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert!(compile("x 1", resolver).is_err());
        assert!(compile("(x", resolver).is_err());
    }
}
