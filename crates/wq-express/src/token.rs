//! Tokenizer for kinetic formulas.

use crate::error::{ExprError, ExprResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

/// A token together with its byte offset in the source, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Tokenize a whole formula up front.
///
/// Numbers accept decimal and exponent forms (`1`, `0.5`, `2.5e-3`);
/// identifiers are `[A-Za-z_][A-Za-z0-9_]*`.
pub fn tokenize(source: &str) -> ExprResult<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '+' => {
                out.push(Spanned { token: Token::Plus, pos: i });
                i += 1;
            }
            '-' => {
                out.push(Spanned { token: Token::Minus, pos: i });
                i += 1;
            }
            '*' => {
                out.push(Spanned { token: Token::Star, pos: i });
                i += 1;
            }
            '/' => {
                out.push(Spanned { token: Token::Slash, pos: i });
                i += 1;
            }
            '^' => {
                out.push(Spanned { token: Token::Caret, pos: i });
                i += 1;
            }
            '(' => {
                out.push(Spanned { token: Token::LParen, pos: i });
                i += 1;
            }
            ')' => {
                out.push(Spanned { token: Token::RParen, pos: i });
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // exponent part
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &source[start..i];
                let value: f64 = text.parse().map_err(|_| ExprError::UnexpectedToken {
                    pos: start,
                    found: text.to_string(),
                })?;
                out.push(Spanned {
                    token: Token::Num(value),
                    pos: start,
                });
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                out.push(Spanned {
                    token: Token::Ident(source[start..i].to_string()),
                    pos: start,
                });
            }
            _ => return Err(ExprError::UnexpectedChar { pos: i, ch: c }),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_simple() {
        let toks = tokenize("-k * C1 + 2.5e-3").unwrap();
        let kinds: Vec<_> = toks.into_iter().map(|s| s.token).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Minus,
                Token::Ident("k".into()),
                Token::Star,
                Token::Ident("C1".into()),
                Token::Plus,
                Token::Num(2.5e-3),
            ]
        );
    }

    #[test]
    fn tokenize_rejects_garbage() {
        let err = tokenize("a @ b").unwrap_err();
        assert!(matches!(err, ExprError::UnexpectedChar { pos: 2, ch: '@' }));
    }

    #[test]
    fn number_positions_recorded() {
        let toks = tokenize("  42").unwrap();
        assert_eq!(toks[0].pos, 2);
    }
}
