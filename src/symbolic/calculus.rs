//! Differentiation, antiderivatives, and limits at the ends of a piece.
//!
//! Every additive term is read through its [`TermShape`]
//! `c · x^p · ln(x)^k · exp(a·x)`, which covers the closed forms the
//! probability engine produces: polynomials, exponential families, and the
//! logarithms that come out of products and log transforms.

use crate::symbolic::backend::{
    BackendError,
    Deadline
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};
use crate::symbolic::simplify::{
    expand,
    simplify
};

/// Largest polynomial degree integrated against an exponential.
const MAX_EXP_POLY_DEGREE: f64 = 40.0;

pub fn differentiate(expr: &Expr, var: &Symbol) -> Expr {
    simplify(&derivative(expr, var))
}

fn derivative(expr: &Expr, var: &Symbol) -> Expr {
    if !expr.contains(var) {
        return Expr::zero();
    }
    match expr {
        Expr::Num(_) => Expr::zero(),
        Expr::Sym(_) => Expr::one(),
        Expr::Add(terms) => Expr::Add(terms.iter().map(|t| derivative(t, var)).collect()),
        Expr::Mul(factors) => {
            let terms = (0..factors.len())
                .filter(|&i| factors[i].contains(var))
                .map(|i| {
                    let mut product: Vec<Expr> = factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, f)| f.clone())
                        .collect();
                    product.push(derivative(&factors[i], var));
                    Expr::Mul(product)
                })
                .collect();
            Expr::Add(terms)
        }
        Expr::Pow(base, exponent) => {
            let base = (**base).clone();
            let exponent = (**exponent).clone();
            if !exponent.contains(var) {
                // e * b^(e-1) * b'
                let lowered = Expr::pow(base.clone(), exponent.clone() - Expr::one());
                Expr::Mul(vec![exponent, lowered, derivative(&base, var)])
            } else if !base.contains(var) {
                let power = Expr::pow(base.clone(), exponent.clone());
                Expr::Mul(vec![power, Expr::ln(base), derivative(&exponent, var)])
            } else {
                let power = Expr::pow(base.clone(), exponent.clone());
                let inner = Expr::Mul(vec![derivative(&exponent, var), Expr::ln(base.clone())])
                    + Expr::Mul(vec![exponent, derivative(&base, var), Expr::recip(base)]);
                Expr::Mul(vec![power, inner])
            }
        }
        Expr::Exp(arg) => Expr::Mul(vec![expr.clone(), derivative(arg, var)]),
        Expr::Ln(arg) => Expr::Mul(vec![derivative(arg, var), Expr::recip((**arg).clone())]),
    }
}

// ─────────────────────────────────────────────
// Term shapes
// ─────────────────────────────────────────────

/// `coefficient · x^power · ln(x)^log_power · exp(rate · x)`.
#[derive(Clone, Debug)]
pub(crate) struct TermShape {
    pub coefficient: Expr,
    pub power: f64,
    pub log_power: u32,
    pub rate: Expr,
}

impl TermShape {
    fn has_rate(&self) -> bool {
        !self.rate.is_zero()
    }
}

pub(crate) fn additive_terms(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::Add(terms) => terms.clone(),
        other => vec![other.clone()],
    }
}

fn factors_of(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::Mul(factors) => factors.clone(),
        other => vec![other.clone()],
    }
}

/// `(a, b)` with `arg = a·x + b`, or `None` when `arg` is not linear in `x`.
pub(crate) fn linear_coefficients(arg: &Expr, var: &Symbol) -> Option<(Expr, Expr)> {
    let mut slope = Vec::new();
    let mut intercept = Vec::new();
    for term in additive_terms(&expand(arg)) {
        if !term.contains(var) {
            intercept.push(term);
            continue;
        }
        let factors = factors_of(&term);
        let hits: Vec<&Expr> = factors.iter().filter(|f| f.contains(var)).collect();
        if hits.len() != 1 || *hits[0] != Expr::Sym(var.clone()) {
            return None;
        }
        let rest: Vec<Expr> = factors.iter().filter(|f| !f.contains(var)).cloned().collect();
        slope.push(Expr::Mul(rest));
    }
    Some((simplify(&Expr::Add(slope)), simplify(&Expr::Add(intercept))))
}

pub(crate) fn term_shape(term: &Expr, var: &Symbol) -> Option<TermShape> {
    let mut coefficient = Vec::new();
    let mut power = 0.0;
    let mut log_power = 0_u32;
    let mut rate = Vec::new();
    let x = Expr::Sym(var.clone());
    for factor in factors_of(term) {
        if !factor.contains(var) {
            coefficient.push(factor);
            continue;
        }
        match &factor {
            Expr::Sym(_) => power += 1.0,
            Expr::Pow(base, exponent) if **base == x => power += exponent.as_num()?,
            Expr::Ln(arg) if **arg == x => log_power += 1,
            Expr::Pow(base, exponent) if matches!(&**base, Expr::Ln(a) if **a == x) => {
                let k = exponent.as_num()?;
                if k < 1.0 || k.fract() != 0.0 {
                    return None;
                }
                log_power += k as u32;
            }
            Expr::Exp(arg) => {
                let (a, b) = linear_coefficients(arg, var)?;
                rate.push(a);
                if !b.is_zero() {
                    coefficient.push(Expr::exp(b));
                }
            }
            Expr::Pow(base, exponent) if !base.contains(var) && base.to_f64().is_some_and(|b| b > 0.0) => {
                let (a, b) = linear_coefficients(exponent, var)?;
                rate.push(Expr::Mul(vec![a, Expr::ln((**base).clone())]));
                coefficient.push(Expr::pow((**base).clone(), b));
            }
            _ => return None,
        }
    }
    Some(TermShape {
        coefficient: simplify(&Expr::Mul(coefficient)),
        power,
        log_power,
        rate: simplify(&Expr::Add(rate)),
    })
}

// ─────────────────────────────────────────────
// Signs
// ─────────────────────────────────────────────

/// Sign of an expression with every free symbol taken as positive.
pub fn sign_of(expr: &Expr) -> Option<i8> {
    if let Some(v) = expr.to_f64() {
        return if v > 0.0 {
            Some(1)
        } else if v < 0.0 {
            Some(-1)
        } else if v == 0.0 {
            Some(0)
        } else {
            None
        };
    }
    match expr {
        Expr::Num(_) => None,
        Expr::Sym(_) => Some(1),
        Expr::Exp(_) => Some(1),
        Expr::Mul(factors) => {
            let mut sign = 1_i8;
            for f in factors {
                sign *= sign_of(f)?;
            }
            Some(sign)
        }
        Expr::Pow(base, exponent) => match sign_of(base)? {
            1 => Some(1),
            0 => Some(0),
            _ => {
                let e = exponent.as_num()?;
                if e.fract() != 0.0 {
                    None
                } else if (e as i64) % 2 == 0 {
                    Some(1)
                } else {
                    Some(-1)
                }
            }
        },
        Expr::Add(terms) => {
            let signs: Option<Vec<i8>> = terms.iter().map(sign_of).collect();
            let signs = signs?;
            let nonzero: Vec<i8> = signs.into_iter().filter(|s| *s != 0).collect();
            match nonzero.first() {
                None => Some(0),
                Some(&first) if nonzero.iter().all(|s| *s == first) => Some(first),
                _ => None,
            }
        }
        Expr::Ln(_) => None,
    }
}

// ─────────────────────────────────────────────
// Antiderivatives
// ─────────────────────────────────────────────

fn integration_error(expr: &Expr, var: &Symbol) -> BackendError {
    BackendError::Integration {
        expr: expr.to_string(),
        var: var.to_string(),
    }
}

fn factorial(n: u32) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// ∫ x^p ln(x)^k dx
fn power_log_antiderivative(x: &Expr, power: f64, log_power: u32) -> Expr {
    let reciprocal_power = (power + 1.0).abs() < 1e-12;
    if log_power == 0 {
        return if reciprocal_power {
            Expr::ln(x.clone())
        } else {
            Expr::Mul(vec![
                Expr::num(1.0 / (power + 1.0)),
                Expr::powf(x.clone(), power + 1.0),
            ])
        };
    }
    if reciprocal_power {
        let k = log_power as f64 + 1.0;
        return Expr::Mul(vec![Expr::num(1.0 / k), Expr::powf(Expr::ln(x.clone()), k)]);
    }
    let head = Expr::Mul(vec![
        Expr::num(1.0 / (power + 1.0)),
        Expr::powf(x.clone(), power + 1.0),
        Expr::powf(Expr::ln(x.clone()), log_power as f64),
    ]);
    let tail = power_log_antiderivative(x, power, log_power - 1);
    head - Expr::Mul(vec![Expr::num(log_power as f64 / (power + 1.0)), tail])
}

/// ∫ x^n exp(a x) dx = exp(a x) Σ_j (-1)^j n!/(n-j)! x^(n-j) / a^(j+1)
fn polynomial_exp_antiderivative(x: &Expr, degree: u32, rate: &Expr) -> Expr {
    let terms = (0..=degree)
        .map(|j| {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            let falling = factorial(degree) / factorial(degree - j);
            Expr::Mul(vec![
                Expr::num(sign * falling),
                Expr::powf(x.clone(), (degree - j) as f64),
                Expr::powf(rate.clone(), -((j + 1) as f64)),
            ])
        })
        .collect();
    Expr::Mul(vec![
        Expr::exp(Expr::Mul(vec![rate.clone(), x.clone()])),
        Expr::Add(terms),
    ])
}

fn integrate_term(term: &Expr, var: &Symbol) -> Result<Expr, BackendError> {
    let x = Expr::Sym(var.clone());
    if !term.contains(var) {
        return Ok(Expr::Mul(vec![term.clone(), x]));
    }
    if let Some(shape) = term_shape(term, var) {
        if !shape.has_rate() {
            let core = power_log_antiderivative(&x, shape.power, shape.log_power);
            return Ok(Expr::Mul(vec![shape.coefficient, core]));
        }
        let degree = shape.power;
        if shape.log_power == 0 && degree >= 0.0 && degree.fract() == 0.0 && degree <= MAX_EXP_POLY_DEGREE {
            let core = polynomial_exp_antiderivative(&x, degree as u32, &shape.rate);
            return Ok(Expr::Mul(vec![shape.coefficient, core]));
        }
        return Err(integration_error(term, var));
    }
    // linear substitution u = αx + β for a single composite factor
    let factors = factors_of(term);
    let (inner, outer): (Vec<Expr>, Vec<Expr>) = factors.into_iter().partition(|f| f.contains(var));
    if inner.len() != 1 {
        return Err(integration_error(term, var));
    }
    let coefficient = Expr::Mul(outer);
    let result = match &inner[0] {
        Expr::Pow(base, exponent) if !exponent.contains(var) => {
            let (alpha, _) = linear_coefficients(base, var).ok_or_else(|| integration_error(term, var))?;
            if alpha.is_zero() {
                return Err(integration_error(term, var));
            }
            let q = (**exponent).clone();
            if q.as_num().is_some_and(|q| (q + 1.0).abs() < 1e-12) {
                Expr::ln((**base).clone()) / alpha
            } else {
                let raised = simplify(&(q.clone() + Expr::one()));
                Expr::pow((**base).clone(), raised.clone()) / (alpha * raised)
            }
        }
        Expr::Ln(arg) => {
            let (alpha, _) = linear_coefficients(arg, var).ok_or_else(|| integration_error(term, var))?;
            if alpha.is_zero() {
                return Err(integration_error(term, var));
            }
            let u = (**arg).clone();
            (u.clone() * Expr::ln(u.clone()) - u) / alpha
        }
        _ => return Err(integration_error(term, var)),
    };
    Ok(Expr::Mul(vec![coefficient, result]))
}

pub fn antiderivative(expr: &Expr, var: &Symbol, deadline: &Deadline) -> Result<Expr, BackendError> {
    let expanded = expand(expr);
    let mut parts = Vec::new();
    for term in additive_terms(&expanded) {
        deadline.check()?;
        parts.push(integrate_term(&term, var)?);
    }
    Ok(simplify(&Expr::Add(parts)))
}

// ─────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────

fn limit_error(expr: &Expr, var: &Symbol, point: &Expr) -> BackendError {
    BackendError::Limit {
        expr: expr.to_string(),
        var: var.to_string(),
        point: point.to_string(),
    }
}

fn divergent(expr: &Expr, var: &Symbol, point: &Expr) -> BackendError {
    BackendError::Divergent {
        expr: expr.to_string(),
        var: var.to_string(),
        point: point.to_string(),
    }
}

/// Limit of a single shaped term as `x → direction · ∞`.
fn term_limit_at_infinity(shape: &TermShape, direction: i8) -> Result<Expr, Option<i8>> {
    let growth_sign = |coefficient: &Expr, parity_power: f64| -> Option<i8> {
        let c = sign_of(coefficient)?;
        let x_sign = if direction > 0 || parity_power.fract() != 0.0 || (parity_power as i64) % 2 == 0 {
            1
        } else {
            -1
        };
        Some(c * x_sign)
    };
    if shape.has_rate() {
        let s = sign_of(&shape.rate).ok_or(None)? * direction;
        return if s < 0 {
            Ok(Expr::zero())
        } else {
            Err(Some(growth_sign(&shape.coefficient, shape.power).ok_or(None)?))
        };
    }
    if shape.power < 0.0 {
        return Ok(Expr::zero());
    }
    if shape.power == 0.0 && shape.log_power == 0 {
        return Ok(shape.coefficient.clone());
    }
    Err(Some(growth_sign(&shape.coefficient, shape.power).ok_or(None)?))
}

/// Value of `expr` at `point`, which may be a finite expression, `0`, or `±inf`.
/// A divergent limit comes back as `±inf` when its sign is determined.
pub fn limit(expr: &Expr, var: &Symbol, point: &Expr, deadline: &Deadline) -> Result<Expr, BackendError> {
    if let Some(direction) = point.infinite_sign() {
        let expanded = expand(expr);
        let mut finite = Vec::new();
        let mut infinite_sign: Option<i8> = None;
        for term in additive_terms(&expanded) {
            deadline.check()?;
            if !term.contains(var) {
                finite.push(term);
                continue;
            }
            let shape = term_shape(&term, var).ok_or_else(|| limit_error(expr, var, point))?;
            match term_limit_at_infinity(&shape, direction) {
                Ok(value) => finite.push(value),
                Err(Some(sign)) => match infinite_sign {
                    Some(previous) if previous != sign => return Err(limit_error(expr, var, point)),
                    _ => infinite_sign = Some(sign),
                },
                Err(None) => return Err(limit_error(expr, var, point)),
            }
        }
        return Ok(match infinite_sign {
            Some(s) if s > 0 => Expr::infinity(),
            Some(_) => Expr::neg_infinity(),
            None => simplify(&Expr::Add(finite)),
        });
    }
    let direct = simplify(&expr.subs(var, point));
    if !direct.has_non_finite() || direct.infinite_sign().is_some() {
        return Ok(direct);
    }
    let at_zero = point.to_f64() == Some(0.0);
    let expanded = expand(expr);
    let mut parts = Vec::new();
    for term in additive_terms(&expanded) {
        deadline.check()?;
        let value = simplify(&term.subs(var, point));
        if !value.has_non_finite() {
            parts.push(value);
            continue;
        }
        if !at_zero {
            return Err(divergent(expr, var, point));
        }
        let shape = term_shape(&term, var).ok_or_else(|| limit_error(expr, var, point))?;
        if shape.power > 0.0 {
            parts.push(Expr::zero());
        } else if shape.power == 0.0 && shape.log_power == 0 {
            parts.push(shape.coefficient.clone());
        } else {
            return Err(divergent(expr, var, point));
        }
    }
    Ok(simplify(&Expr::Add(parts)))
}

pub fn definite_integral(
    expr: &Expr,
    var: &Symbol,
    lower: &Expr,
    upper: &Expr,
    deadline: &Deadline,
) -> Result<Expr, BackendError> {
    let primitive = antiderivative(expr, var, deadline)?;
    let at_upper = if *upper == Expr::Sym(var.clone()) {
        primitive.clone()
    } else {
        limit(&primitive, var, upper, deadline)?
    };
    let at_lower = limit(&primitive, var, lower, deadline)?;
    if at_upper.infinite_sign().is_some() || at_lower.infinite_sign().is_some() {
        return Err(divergent(expr, var, if at_upper.infinite_sign().is_some() { upper } else { lower }));
    }
    Ok(expand(&(at_upper - at_lower)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadline() -> Deadline {
        Deadline::new("test", std::time::Duration::from_secs(10))
    }

    fn x() -> (Symbol, Expr) {
        let s = Symbol::new("x");
        let e = Expr::sym(&s);
        (s, e)
    }

    #[test]
    fn test_derivative_of_exponential_density() {
        let (xs, x) = x();
        let e = Expr::num(1.0) - Expr::exp(Expr::num(-2.0) * x);
        let d = differentiate(&e, &xs);
        assert!((d.eval_at(&xs, 0.5).unwrap() - 2.0 * (-1.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_polynomial() {
        let (xs, x) = x();
        let e = Expr::num(2.0) - x;
        let r = definite_integral(&e, &xs, &Expr::one(), &Expr::num(2.0), &deadline()).unwrap();
        assert!((r.to_f64().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_exponential_to_infinity() {
        let (xs, x) = x();
        let density = Expr::num(2.0) * Expr::exp(Expr::num(-2.0) * x.clone());
        let second_moment = Expr::powf(x, 2.0) * density;
        let r = definite_integral(&second_moment, &xs, &Expr::zero(), &Expr::infinity(), &deadline()).unwrap();
        assert!((r.to_f64().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_reciprocal_gives_log() {
        let (xs, x) = x();
        let v = Symbol::new("v");
        let r = definite_integral(&Expr::recip(x), &xs, &Expr::sym(&v), &Expr::one(), &deadline()).unwrap();
        assert!((r.eval_at(&v, 0.25).unwrap() + 0.25_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_log_from_zero() {
        let (xs, x) = x();
        let r = definite_integral(&Expr::ln(x), &xs, &Expr::zero(), &Expr::one(), &deadline()).unwrap();
        assert!((r.to_f64().unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_divergent_integral_is_reported() {
        let (xs, x) = x();
        let r = definite_integral(&Expr::recip(x), &xs, &Expr::zero(), &Expr::one(), &deadline());
        assert!(matches!(r, Err(BackendError::Divergent { .. })));
    }

    #[test]
    fn test_non_elementary_integral_is_reported() {
        let (xs, x) = x();
        let e = Expr::exp(Expr::num(-1.0) * Expr::powf(x, 2.0));
        let r = antiderivative(&e, &xs, &deadline());
        assert!(matches!(r, Err(BackendError::Integration { .. })));
    }

    #[test]
    fn test_limit_of_polynomial_at_infinity() {
        let (xs, x) = x();
        let e = Expr::num(2.0) * x + Expr::one();
        let r = limit(&e, &xs, &Expr::infinity(), &deadline()).unwrap();
        assert_eq!(r, Expr::infinity());
    }

    #[test]
    fn test_sign_under_positive_parameters() {
        let theta = Expr::symbol("theta");
        assert_eq!(sign_of(&(Expr::num(-1.0) * theta.clone())), Some(-1));
        assert_eq!(sign_of(&(theta - Expr::symbol("t"))), None);
    }
}
