//! Canonical forms for [`Expr`].
//!
//! `simplify` flattens sums and products, folds numbers, collects like terms
//! and powers of a common base, and applies the exp/ln identities the engine
//! relies on. `expand` additionally distributes products over sums, which is
//! the form the integrator and the solver read.

use crate::symbolic::expr::Expr;

/// Largest positive integer power of a sum that `expand` multiplies out.
const MAX_EXPANDED_POWER: f64 = 12.0;

/// Relative size under which a collected coefficient counts as cancelled.
const CANCELLATION_EPS: f64 = 1e-12;

/// `ln(v)` is folded to `k` when it lies this close to an integer `k`.
const NATURAL_EXPONENT_EPS: f64 = 1e-12;
const MAX_FOLDED_EXPONENT: f64 = 64.0;

pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Sym(_) => expr.clone(),
        Expr::Add(terms) => simplify_add(terms.iter().map(simplify).collect()),
        Expr::Mul(factors) => simplify_mul(factors.iter().map(simplify).collect()),
        Expr::Pow(base, exponent) => simplify_pow(simplify(base), simplify(exponent)),
        Expr::Exp(arg) => simplify_exp(simplify(arg)),
        Expr::Ln(arg) => simplify_ln(simplify(arg)),
    }
}

pub fn expand(expr: &Expr) -> Expr {
    expand_simplified(&simplify(expr))
}

fn expand_simplified(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Sym(_) => expr.clone(),
        Expr::Add(terms) => simplify_add(terms.iter().map(expand_simplified).collect()),
        Expr::Mul(factors) => {
            let factors: Vec<Expr> = factors.iter().map(expand_simplified).collect();
            distribute(factors)
        }
        Expr::Pow(base, exponent) => {
            let base = expand_simplified(base);
            let exponent = expand_simplified(exponent);
            match (&base, exponent.as_num()) {
                (Expr::Add(_), Some(n)) if n > 1.0 && n.fract() == 0.0 && n <= MAX_EXPANDED_POWER => {
                    distribute(vec![base.clone(); n as usize])
                }
                _ => simplify_pow(base, exponent),
            }
        }
        Expr::Exp(arg) => simplify_exp(expand_simplified(arg)),
        Expr::Ln(arg) => simplify_ln(expand_simplified(arg)),
    }
}

/// Multiplies out a product whose factors are already expanded.
fn distribute(factors: Vec<Expr>) -> Expr {
    let mut products: Vec<Vec<Expr>> = vec![Vec::new()];
    for factor in factors {
        match factor {
            Expr::Add(terms) => {
                let mut next = Vec::with_capacity(products.len() * terms.len());
                for partial in &products {
                    for term in &terms {
                        let mut p = partial.clone();
                        p.push(term.clone());
                        next.push(p);
                    }
                }
                products = next;
            }
            other => products.iter_mut().for_each(|p| p.push(other.clone())),
        }
    }
    let terms: Vec<Expr> = products
        .into_iter()
        .map(|p| {
            let product = simplify_mul(p);
            // a product may re-form a sum, e.g. exp(ln(1 + x))
            match product {
                Expr::Mul(ref fs) if fs.iter().any(|f| matches!(f, Expr::Add(_))) => {
                    expand_simplified(&product)
                }
                other => other,
            }
        })
        .collect();
    simplify_add(terms)
}

/// Splits `c * rest` into its numeric coefficient and the remaining factors.
pub fn split_coefficient(term: &Expr) -> (f64, Expr) {
    match term {
        Expr::Num(v) => (*v, Expr::one()),
        Expr::Mul(factors) => match factors.first() {
            Some(Expr::Num(c)) => {
                let rest = &factors[1..];
                let rest = if rest.len() == 1 { rest[0].clone() } else { Expr::Mul(rest.to_vec()) };
                (*c, rest)
            }
            _ => (1.0, term.clone()),
        },
        _ => (1.0, term.clone()),
    }
}

fn split_power(factor: Expr) -> (Expr, Expr) {
    match factor {
        Expr::Pow(base, exponent) => (*base, *exponent),
        other => (other, Expr::one()),
    }
}

fn with_coefficient(coefficient: f64, rest: Expr) -> Expr {
    if coefficient == 1.0 {
        return rest;
    }
    match rest {
        Expr::Num(v) => Expr::Num(coefficient * v),
        Expr::Mul(mut factors) => {
            factors.insert(0, Expr::Num(coefficient));
            Expr::Mul(factors)
        }
        other => Expr::Mul(vec![Expr::Num(coefficient), other]),
    }
}

fn is_integer(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0
}

pub(crate) fn simplify_add(terms: Vec<Expr>) -> Expr {
    let mut constant = 0.0;
    let mut constant_scale = 0.0_f64;
    // (rest, coefficient, sum of |contributions|)
    let mut collected: Vec<(Expr, f64, f64)> = Vec::new();
    let mut pending = terms;
    while let Some(term) = pending.pop() {
        match term {
            Expr::Add(inner) => pending.extend(inner),
            Expr::Num(v) => {
                constant += v;
                constant_scale = constant_scale.max(v.abs());
            }
            other => {
                let (c, rest) = split_coefficient(&other);
                match collected.iter_mut().find(|(r, _, _)| *r == rest) {
                    Some(entry) => {
                        entry.1 += c;
                        entry.2 += c.abs();
                    }
                    None => collected.push((rest, c, c.abs())),
                }
            }
        }
    }
    let mut out: Vec<Expr> = collected
        .into_iter()
        .filter(|(_, c, scale)| !(c.abs() <= CANCELLATION_EPS * scale))
        .map(|(rest, c, _)| with_coefficient(c, rest))
        .collect();
    if constant != 0.0 && !(constant.abs() <= CANCELLATION_EPS * constant_scale) {
        out.push(Expr::Num(constant));
    } else if constant.is_nan() {
        out.push(Expr::Num(constant));
    }
    match out.len() {
        0 => Expr::zero(),
        1 => out.remove(0),
        _ => {
            out.sort_by(|a, b| a.canonical_cmp(b));
            Expr::Add(out)
        }
    }
}

pub(crate) fn simplify_mul(factors: Vec<Expr>) -> Expr {
    let mut coefficient = 1.0;
    let mut groups: Vec<(Expr, Vec<Expr>)> = Vec::new();
    let mut exp_args: Vec<Expr> = Vec::new();
    let mut exp_final: Option<Expr> = None;
    let mut pending = factors;
    loop {
        while let Some(factor) = pending.pop() {
            match factor {
                Expr::Mul(inner) => pending.extend(inner),
                Expr::Num(v) => coefficient *= v,
                Expr::Exp(arg) => exp_args.push(*arg),
                other => {
                    let (base, exponent) = split_power(other);
                    match groups.iter_mut().find(|(b, _)| *b == base) {
                        Some(entry) => entry.1.push(exponent),
                        None => groups.push((base, vec![exponent])),
                    }
                }
            }
        }
        if exp_args.is_empty() {
            break;
        }
        if let Some(previous) = exp_final.take() {
            exp_args.push(previous);
        }
        let arg = simplify_add(std::mem::take(&mut exp_args));
        match simplify_exp(arg) {
            Expr::Exp(arg) => exp_final = Some(*arg),
            other => pending.push(other),
        }
        if pending.is_empty() {
            break;
        }
    }
    if coefficient == 0.0 {
        return Expr::zero();
    }
    let mut out: Vec<Expr> = Vec::new();
    for (base, exponents) in groups {
        let exponent = simplify_add(exponents);
        if exponent.is_zero() {
            continue;
        }
        match simplify_pow(base, exponent) {
            Expr::Num(v) => coefficient *= v,
            Expr::Mul(inner) => {
                for f in inner {
                    match f {
                        Expr::Num(v) => coefficient *= v,
                        other => out.push(other),
                    }
                }
            }
            other => out.push(other),
        }
    }
    if let Some(arg) = exp_final {
        out.push(Expr::exp(arg));
    }
    if coefficient == 0.0 {
        return Expr::zero();
    }
    out.sort_by(|a, b| a.canonical_cmp(b));
    if out.is_empty() {
        return Expr::Num(coefficient);
    }
    if coefficient != 1.0 {
        out.insert(0, Expr::Num(coefficient));
    }
    if out.len() == 1 { out.remove(0) } else { Expr::Mul(out) }
}

pub(crate) fn simplify_pow(base: Expr, exponent: Expr) -> Expr {
    if exponent.is_zero() {
        return Expr::one();
    }
    if exponent.is_one() {
        return base;
    }
    if base.is_one() {
        return Expr::one();
    }
    match (&base, exponent.as_num()) {
        (Expr::Num(b), Some(e)) => {
            let value = b.powf(e);
            if value.is_nan() {
                return Expr::pow(base, exponent);
            }
            return Expr::Num(value);
        }
        (Expr::Num(b), None) if *b == 0.0 => return Expr::zero(),
        _ => {}
    }
    match base {
        Expr::Pow(inner_base, inner_exponent) => {
            let composable = match (exponent.as_num(), inner_exponent.as_num()) {
                (Some(e2), _) if is_integer(e2) => true,
                (_, Some(e1)) => e1.abs() < 1.0,
                _ => false,
            };
            if composable {
                let combined = simplify_mul(vec![*inner_exponent, exponent]);
                simplify_pow(*inner_base, combined)
            } else {
                Expr::pow(Expr::Pow(inner_base, inner_exponent), exponent)
            }
        }
        Expr::Mul(factors) => {
            if exponent.as_num().is_some_and(is_integer) {
                return simplify_mul(
                    factors
                        .into_iter()
                        .map(|f| simplify_pow(f, exponent.clone()))
                        .collect(),
                );
            }
            match factors.first() {
                Some(Expr::Num(c)) if *c > 0.0 => {
                    let rest = factors[1..].to_vec();
                    let rest = if rest.len() == 1 { rest[0].clone() } else { Expr::Mul(rest) };
                    simplify_mul(vec![
                        simplify_pow(Expr::Num(*c), exponent.clone()),
                        Expr::pow(rest, exponent),
                    ])
                }
                _ => Expr::pow(Expr::Mul(factors), exponent),
            }
        }
        Expr::Exp(arg) => simplify_exp(simplify_mul(vec![*arg, exponent])),
        other => Expr::pow(other, exponent),
    }
}

/// `c * ln(u)` with a single log factor, returned as `(c, u)`.
fn log_term(term: &Expr) -> Option<(Expr, Expr)> {
    match term {
        Expr::Ln(u) => Some((Expr::one(), (**u).clone())),
        Expr::Mul(factors) => {
            let logs: Vec<usize> = factors
                .iter()
                .enumerate()
                .filter(|(_, f)| matches!(f, Expr::Ln(_)))
                .map(|(i, _)| i)
                .collect();
            if logs.len() != 1 {
                return None;
            }
            let Expr::Ln(u) = &factors[logs[0]] else {
                return None;
            };
            let rest: Vec<Expr> = factors
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != logs[0])
                .map(|(_, f)| f.clone())
                .collect();
            let coefficient = if rest.len() == 1 { rest[0].clone() } else { Expr::Mul(rest) };
            Some((coefficient, (**u).clone()))
        }
        _ => None,
    }
}

pub(crate) fn simplify_exp(arg: Expr) -> Expr {
    match &arg {
        Expr::Num(v) if *v == 0.0 => return Expr::one(),
        Expr::Num(v) if *v == f64::NEG_INFINITY => return Expr::zero(),
        Expr::Num(v) if *v == f64::INFINITY => return Expr::infinity(),
        Expr::Ln(u) => return (**u).clone(),
        _ => {}
    }
    let terms = match &arg {
        Expr::Add(terms) => terms.clone(),
        other => vec![other.clone()],
    };
    let mut powers = Vec::new();
    let mut rest = Vec::new();
    for term in terms {
        match log_term(&term) {
            Some((coefficient, u)) => powers.push(simplify_pow(u, coefficient)),
            None => rest.push(term),
        }
    }
    if powers.is_empty() {
        return Expr::exp(arg);
    }
    if !rest.is_empty() {
        powers.push(Expr::exp(simplify_add(rest)));
    }
    simplify_mul(powers)
}

/// `k` when `|v|` is `e^k` for a small integer `k`, as left behind by a
/// breakpoint such as `exp(1)` evaluated to a float.
fn natural_exponent(v: f64) -> Option<f64> {
    let v = v.abs();
    if !v.is_finite() || v == 0.0 {
        return None;
    }
    let log = v.ln();
    let k = log.round();
    if k == 0.0 || k.abs() > MAX_FOLDED_EXPONENT {
        return None;
    }
    ((log - k).abs() <= NATURAL_EXPONENT_EPS).then_some(k)
}

pub(crate) fn simplify_ln(arg: Expr) -> Expr {
    if let Some(k) = arg.as_num().and_then(natural_exponent) {
        return Expr::Num(k);
    }
    match arg {
        Expr::Num(v) if v == 1.0 || v == -1.0 => Expr::zero(),
        Expr::Num(v) if v == 0.0 => Expr::neg_infinity(),
        Expr::Num(v) if v.is_infinite() => Expr::infinity(),
        Expr::Num(v) if v < 0.0 => Expr::ln(Expr::Num(-v)),
        Expr::Exp(u) => *u,
        Expr::Pow(base, exponent) => simplify_mul(vec![*exponent, simplify_ln(*base)]),
        Expr::Mul(factors) => simplify_add(factors.into_iter().map(simplify_ln).collect()),
        other => Expr::ln(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::expr::Symbol;

    fn x() -> Expr {
        Expr::sym(&Symbol::new("x"))
    }

    #[test]
    fn test_collects_like_terms() {
        let e = x() + x() + Expr::num(2.0) * x();
        assert_eq!(simplify(&e), Expr::Mul(vec![Expr::num(4.0), x()]));
    }

    #[test]
    fn test_cancellation_gives_zero() {
        let e = x() - x();
        assert_eq!(simplify(&e), Expr::zero());
    }

    #[test]
    fn test_power_grouping() {
        let e = x() * Expr::recip(x()) * Expr::recip(x());
        assert_eq!(simplify(&e), Expr::recip(x()));
    }

    #[test]
    fn test_exp_and_ln_identities() {
        let e = Expr::ln(Expr::exp(x()));
        assert_eq!(simplify(&e), x());
        let f = Expr::exp(x()) * Expr::recip(Expr::exp(x()));
        assert_eq!(simplify(&f), Expr::one());
        let g = Expr::ln(Expr::exp(Expr::num(2.0)));
        assert_eq!(simplify(&g), Expr::num(2.0));
    }

    #[test]
    fn test_exp_of_scaled_log_becomes_power() {
        let e = Expr::exp(Expr::num(-1.0) * Expr::ln(x()));
        assert_eq!(simplify(&e), Expr::recip(x()));
    }

    #[test]
    fn test_ln_of_quotient_splits() {
        let v = Expr::symbol("v");
        let e = Expr::ln(v.clone() / Expr::exp(Expr::one()));
        let s = simplify(&e);
        assert!((s.eval_at(&Symbol::new("v"), 3.0).unwrap() - (3.0_f64.ln() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ln_of_evaluated_exp_folds_to_its_exponent() {
        let e = std::f64::consts::E;
        assert_eq!(simplify(&Expr::ln(Expr::num(e))), Expr::one());
        assert_eq!(simplify(&Expr::ln(Expr::num(e * e))), Expr::num(2.0));
        // ln(v / e) - ln(e) + 2 = ln(v)
        let v = Expr::symbol("v");
        let s = simplify(&(Expr::ln(v.clone() * Expr::num(1.0 / e)) - Expr::ln(Expr::num(e)) + Expr::num(2.0)));
        assert_eq!(s, Expr::ln(v));
        assert_eq!(simplify(&Expr::ln(Expr::num(2.0))), Expr::ln(Expr::num(2.0)));
    }

    #[test]
    fn test_expand_square() {
        let e = Expr::powf(Expr::num(2.0) - x(), 2.0);
        let expanded = expand(&e);
        let xs = Symbol::new("x");
        for t in [0.0, 0.5, 3.0] {
            assert!((expanded.eval_at(&xs, t).unwrap() - (2.0 - t) * (2.0 - t)).abs() < 1e-12);
        }
        assert!(matches!(expanded, Expr::Add(_)));
    }

    #[test]
    fn test_numeric_folding() {
        let e = Expr::num(2.0) * Expr::powf(Expr::num(4.0), 0.5) + Expr::num(1.0);
        assert_eq!(simplify(&e), Expr::num(5.0));
    }
}
