use std::collections::BTreeSet;

use crate::symbolic::backend::{
    BackendError,
    Deadline
};
use crate::symbolic::calculus::{
    additive_terms,
    differentiate,
    sign_of,
    term_shape
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};
use crate::symbolic::simplify::{
    expand,
    simplify
};

/// Ranges at most this long with numeric ends are summed term by term.
const DIRECT_SUM_LIMIT: f64 = 2000.0;

fn summation_error(expr: &Expr, var: &Symbol) -> BackendError {
    BackendError::Summation {
        expr: expr.to_string(),
        var: var.to_string(),
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Bernoulli numbers `B_0..=B_n` with `B_1 = +1/2`.
fn bernoulli(n: usize) -> Vec<f64> {
    let mut b = vec![0.0; n + 1];
    b[0] = 1.0;
    for m in 1..=n {
        let acc: f64 = (0..m).map(|j| binomial(m + 1, j) * b[j]).sum();
        b[m] = -acc / (m + 1) as f64;
    }
    if n >= 1 {
        b[1] = 0.5;
    }
    b
}

/// `Σ_{k=1}^{n} k^p` as a polynomial in `n`.
fn faulhaber(p: usize, n: &Expr) -> Expr {
    let b = bernoulli(p);
    let terms = (0..=p)
        .map(|j| {
            Expr::Mul(vec![
                Expr::num(binomial(p + 1, j) * b[j] / (p + 1) as f64),
                Expr::powf(n.clone(), (p + 1 - j) as f64),
            ])
        })
        .collect();
    Expr::Add(terms)
}

fn direct_sum(expr: &Expr, var: &Symbol, lo: f64, hi: f64, deadline: &Deadline) -> Result<Expr, BackendError> {
    let mut terms = Vec::new();
    let mut k = lo;
    while k <= hi {
        deadline.check()?;
        terms.push(simplify(&expr.subs(var, &Expr::num(k))));
        k += 1.0;
    }
    Ok(expand(&Expr::Add(terms)))
}

fn sum_term(
    term: &Expr,
    var: &Symbol,
    lower: &Expr,
    upper: &Expr,
    deadline: &Deadline,
) -> Result<Expr, BackendError> {
    let unbounded = upper.infinite_sign() == Some(1);
    if !term.contains(var) {
        if unbounded {
            return Err(summation_error(term, var));
        }
        let count = upper.clone() - lower.clone() + Expr::one();
        return Ok(Expr::Mul(vec![term.clone(), count]));
    }
    let shape = term_shape(term, var).ok_or_else(|| summation_error(term, var))?;
    let power = shape.power;
    if shape.log_power != 0 || power < 0.0 || power.fract() != 0.0 {
        return Err(summation_error(term, var));
    }
    let p = power as usize;
    if shape.rate.is_zero() {
        if unbounded {
            return Err(summation_error(term, var));
        }
        let below = simplify(&(lower.clone() - Expr::one()));
        let partial = faulhaber(p, upper) - faulhaber(p, &below);
        return Ok(Expr::Mul(vec![shape.coefficient, partial]));
    }
    // Σ k^p R^k = (R d/dR)^p Σ R^k, evaluated at R = exp(rate)
    let mut taken: BTreeSet<Symbol> = term.free_symbols();
    taken.extend(lower.free_symbols());
    taken.extend(upper.free_symbols());
    let ratio = Symbol::fresh("R", &taken);
    let r = Expr::sym(&ratio);
    let mut series = if unbounded {
        if sign_of(&shape.rate) != Some(-1) {
            return Err(summation_error(term, var));
        }
        Expr::pow(r.clone(), lower.clone()) / (Expr::one() - r.clone())
    } else {
        (Expr::pow(r.clone(), lower.clone()) - Expr::pow(r.clone(), upper.clone() + Expr::one()))
            / (Expr::one() - r.clone())
    };
    for _ in 0..p {
        deadline.check()?;
        series = simplify(&Expr::Mul(vec![r.clone(), differentiate(&series, &ratio)]));
    }
    let at_rate = series.subs(&ratio, &Expr::exp(shape.rate));
    Ok(Expr::Mul(vec![shape.coefficient, at_rate]))
}

/// `Σ_{var=lower}^{upper} expr` over the integers; `upper` may be `+inf`.
pub fn sum(expr: &Expr, var: &Symbol, lower: &Expr, upper: &Expr, deadline: &Deadline) -> Result<Expr, BackendError> {
    if let (Some(lo), Some(hi)) = (lower.to_f64(), upper.to_f64()) {
        if lo > hi {
            return Ok(Expr::zero());
        }
        if hi.is_finite() && lo.is_finite() && hi - lo <= DIRECT_SUM_LIMIT {
            return direct_sum(expr, var, lo, hi, deadline);
        }
    }
    if lower.infinite_sign().is_some() {
        return Err(summation_error(expr, var));
    }
    let mut parts = Vec::new();
    for term in additive_terms(&expand(expr)) {
        deadline.check()?;
        parts.push(sum_term(&term, var, lower, upper, deadline)?);
    }
    Ok(expand(&Expr::Add(parts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::new("test", Duration::from_secs(10))
    }

    #[test]
    fn test_bernoulli_numbers() {
        let b = bernoulli(4);
        assert!((b[1] - 0.5).abs() < 1e-15);
        assert!((b[2] - 1.0 / 6.0).abs() < 1e-15);
        assert!(b[3].abs() < 1e-15);
        assert!((b[4] + 1.0 / 30.0).abs() < 1e-15);
    }

    #[test]
    fn test_symbolic_upper_bound() {
        let ks = Symbol::new("k");
        let n = Symbol::new("n");
        let r = sum(&Expr::sym(&ks), &ks, &Expr::one(), &Expr::sym(&n), &deadline()).unwrap();
        assert!((r.eval_at(&n, 10.0).unwrap() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_numeric_range_is_direct() {
        let ks = Symbol::new("k");
        let squares = Expr::powf(Expr::sym(&ks), 2.0);
        let r = sum(&squares, &ks, &Expr::one(), &Expr::num(3.0), &deadline()).unwrap();
        assert_eq!(r, Expr::num(14.0));
    }

    #[test]
    fn test_geometric_series_to_infinity() {
        let ks = Symbol::new("k");
        let half_powers = Expr::exp(Expr::num(-std::f64::consts::LN_2) * Expr::sym(&ks));
        let r = sum(&half_powers, &ks, &Expr::zero(), &Expr::infinity(), &deadline()).unwrap();
        assert!((r.to_f64().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_mean() {
        // Σ_{k>=1} k (1/2)^k = 2
        let ks = Symbol::new("k");
        let k = Expr::sym(&ks);
        let term = k.clone() * Expr::exp(Expr::num(-std::f64::consts::LN_2) * k);
        let r = sum(&term, &ks, &Expr::one(), &Expr::infinity(), &deadline()).unwrap();
        assert!((r.to_f64().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_divergent_series_is_reported() {
        let ks = Symbol::new("k");
        let r = sum(&Expr::sym(&ks), &ks, &Expr::one(), &Expr::infinity(), &deadline());
        assert!(matches!(r, Err(BackendError::Summation { .. })));
    }
}
