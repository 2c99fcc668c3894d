use std::str::FromStr;

use thiserror::Error;

use crate::symbolic::expr::Expr;
use crate::symbolic::simplify::simplify;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character `{ch}` at {position}")]
    UnexpectedChar { ch: char, position: usize },
    #[error("unexpected `{token}` at {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(v) => v.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Op(c) => c.to_string(),
            Token::LParen => "(".to_owned(),
            Token::RParen => ")".to_owned(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent part, e.g. 1e-9
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| ParseError::InvalidNumber(text.clone()))?;
                tokens.push((Token::Number(value), start));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((Token::Ident(chars[start..i].iter().collect()), start));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push((Token::Op('^'), i));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push((Token::Op(c), i));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            _ => return Err(ParseError::UnexpectedChar { ch: c, position: i }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), ParseError> {
        let token = self.tokens.get(self.cursor).cloned().ok_or(ParseError::UnexpectedEnd)?;
        self.cursor += 1;
        Ok(token)
    }

    fn expect_close(&mut self) -> Result<(), ParseError> {
        match self.next()? {
            (Token::RParen, _) => Ok(()),
            (token, position) => Err(ParseError::UnexpectedToken {
                token: token.describe(),
                position,
            }),
        }
    }

    fn sum(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.product()?];
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.cursor += 1;
            let rhs = self.product()?;
            terms.push(if op == '+' { rhs } else { -rhs });
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::Add(terms) })
    }

    fn product(&mut self) -> Result<Expr, ParseError> {
        let mut factors = vec![self.unary()?];
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.cursor += 1;
            let rhs = self.unary()?;
            factors.push(if op == '*' { rhs } else { Expr::recip(rhs) });
        }
        Ok(if factors.len() == 1 { factors.remove(0) } else { Expr::Mul(factors) })
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.cursor += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.cursor += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.cursor += 1;
            let exponent = self.unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        match self.next()? {
            (Token::Number(v), _) => Ok(Expr::num(v)),
            (Token::LParen, _) => {
                let inner = self.sum()?;
                self.expect_close()?;
                Ok(inner)
            }
            (Token::Ident(name), _) if self.peek() == Some(&Token::LParen) => {
                self.cursor += 1;
                let arg = self.sum()?;
                self.expect_close()?;
                match name.as_str() {
                    "exp" => Ok(Expr::exp(arg)),
                    "ln" | "log" => Ok(Expr::ln(arg)),
                    "sqrt" => Ok(Expr::sqrt(arg)),
                    _ => Err(ParseError::UnknownFunction(name)),
                }
            }
            (Token::Ident(name), _) => Ok(match name.as_str() {
                "e" | "E" => Expr::exp(Expr::one()),
                "pi" | "PI" => Expr::num(std::f64::consts::PI),
                "inf" | "oo" | "infinity" => Expr::infinity(),
                _ => Expr::symbol(&name),
            }),
            (token, position) => Err(ParseError::UnexpectedToken {
                token: token.describe(),
                position,
            }),
        }
    }
}

/// Parses infix notation such as `2*exp(-2*x)` or `x^(theta - 1)`.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        cursor: 0,
    };
    let expr = parser.sum()?;
    if let Some((token, position)) = parser.tokens.get(parser.cursor) {
        return Err(ParseError::UnexpectedToken {
            token: token.describe(),
            position: *position,
        });
    }
    Ok(simplify(&expr))
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::expr::Symbol;

    #[test]
    fn test_parse_exponential_density() {
        let e = parse("2*exp(-2*x)").unwrap();
        let x = Symbol::new("x");
        assert!((e.eval_at(&x, 0.5).unwrap() - 2.0 * (-1.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let e = parse("-x^2").unwrap();
        assert_eq!(e.eval_at(&Symbol::new("x"), 3.0), Some(-9.0));
    }

    #[test]
    fn test_constants() {
        assert_eq!(parse("inf").unwrap(), Expr::infinity());
        assert_eq!(parse("-oo").unwrap(), Expr::neg_infinity());
        assert!((parse("ln(e)").unwrap().to_f64().unwrap() - 1.0).abs() < 1e-15);
        assert_eq!(parse("1e-3").unwrap(), Expr::num(1e-3));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse("2 * (x"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("foo(x)"), Err(ParseError::UnknownFunction(_))));
        assert!(matches!(parse("x $ 2"), Err(ParseError::UnexpectedChar { ch: '$', .. })));
        assert!(matches!(parse("x 2"), Err(ParseError::UnexpectedToken { .. })));
    }
}
