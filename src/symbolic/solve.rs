//! Equation solving for the inverses the engine needs: isolation of a single
//! occurrence of the unknown through exp, ln and powers, then polynomials up
//! to degree two.

use crate::symbolic::backend::{
    BackendError,
    Deadline
};
use crate::symbolic::calculus::{
    additive_terms,
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

fn solve_error(equation: &Expr, var: &Symbol) -> BackendError {
    BackendError::Solve {
        equation: format!("{equation} = 0"),
        var: var.to_string(),
    }
}

fn occurrences(expr: &Expr, var: &Symbol) -> usize {
    match expr {
        Expr::Num(_) => 0,
        Expr::Sym(s) => usize::from(s == var),
        Expr::Add(items) | Expr::Mul(items) => items.iter().map(|e| occurrences(e, var)).sum(),
        Expr::Pow(b, e) => occurrences(b, var) + occurrences(e, var),
        Expr::Exp(a) | Expr::Ln(a) => occurrences(a, var),
    }
}

/// Peels the single occurrence of `var` out of `expr = target`.
fn isolate(expr: &Expr, target: Expr, var: &Symbol) -> Option<Vec<Expr>> {
    match expr {
        Expr::Sym(s) if s == var => Some(vec![target]),
        Expr::Add(terms) => {
            let (inner, others): (Vec<Expr>, Vec<Expr>) = terms.iter().cloned().partition(|t| t.contains(var));
            let inner = inner.into_iter().next()?;
            isolate(&inner, target - Expr::Add(others), var)
        }
        Expr::Mul(factors) => {
            let (inner, others): (Vec<Expr>, Vec<Expr>) = factors.iter().cloned().partition(|f| f.contains(var));
            let inner = inner.into_iter().next()?;
            isolate(&inner, target / Expr::Mul(others), var)
        }
        Expr::Pow(base, exponent) if !exponent.contains(var) => {
            let root = Expr::pow(target.clone(), Expr::recip((**exponent).clone()));
            let even = exponent.as_num().is_some_and(|e| e.fract() == 0.0 && (e as i64) % 2 == 0);
            if even {
                if sign_of(&simplify(&target)) == Some(-1) {
                    return Some(Vec::new());
                }
                let mut roots = isolate(base, root.clone(), var)?;
                roots.extend(isolate(base, -root, var)?);
                Some(roots)
            } else {
                isolate(base, root, var)
            }
        }
        Expr::Pow(base, exponent) if !base.contains(var) => {
            isolate(exponent, Expr::ln(target) / Expr::ln((**base).clone()), var)
        }
        Expr::Exp(arg) => {
            if matches!(sign_of(&simplify(&target)), Some(s) if s <= 0) {
                return Some(Vec::new());
            }
            isolate(arg, Expr::ln(target), var)
        }
        Expr::Ln(arg) => {
            let magnitude = Expr::exp(target);
            let mut roots = isolate(arg, magnitude.clone(), var)?;
            roots.extend(isolate(arg, -magnitude, var)?);
            Some(roots)
        }
        _ => None,
    }
}

/// Coefficients `[c0, c1, c2]` of `expr` as a polynomial in `var`.
fn quadratic_coefficients(expr: &Expr, var: &Symbol) -> Option<[Expr; 3]> {
    let mut buckets: [Vec<Expr>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for term in additive_terms(&expand(expr)) {
        if !term.contains(var) {
            buckets[0].push(term);
            continue;
        }
        let shape = term_shape(&term, var)?;
        if !shape.rate.is_zero() || shape.log_power != 0 {
            return None;
        }
        match shape.power {
            p if p == 1.0 => buckets[1].push(shape.coefficient),
            p if p == 2.0 => buckets[2].push(shape.coefficient),
            _ => return None,
        }
    }
    let [b0, b1, b2] = buckets;
    Some([
        simplify(&Expr::Add(b0)),
        simplify(&Expr::Add(b1)),
        simplify(&Expr::Add(b2)),
    ])
}

fn solve_polynomial(c: [Expr; 3]) -> Option<Vec<Expr>> {
    let [c0, c1, c2] = c;
    if c2.is_zero() {
        if c1.is_zero() {
            return None;
        }
        return Some(vec![-c0 / c1]);
    }
    let discriminant = simplify(
        &(Expr::powf(c1.clone(), 2.0) - Expr::Mul(vec![Expr::num(4.0), c2.clone(), c0.clone()])),
    );
    match discriminant.to_f64() {
        Some(d) if d < 0.0 => return Some(Vec::new()),
        Some(d) if d == 0.0 => {
            return Some(vec![-c1 / (Expr::num(2.0) * c2)]);
        }
        _ => {}
    }
    let root = Expr::sqrt(discriminant);
    let denominator = Expr::num(2.0) * c2;
    Some(vec![
        (-c1.clone() + root.clone()) / denominator.clone(),
        (-c1 - root) / denominator,
    ])
}

/// Roots of `lhs = rhs` in `var`, simplified and without duplicates.
pub fn solve(lhs: &Expr, rhs: &Expr, var: &Symbol, deadline: &Deadline) -> Result<Vec<Expr>, BackendError> {
    deadline.check()?;
    let equation = simplify(&(lhs.clone() - rhs.clone()));
    if !equation.contains(var) {
        return Err(solve_error(&equation, var));
    }
    let raw = if occurrences(&equation, var) == 1 {
        isolate(&equation, Expr::zero(), var)
    } else {
        None
    };
    let raw = match raw {
        Some(roots) => roots,
        None => {
            deadline.check()?;
            let coefficients = quadratic_coefficients(&equation, var).ok_or_else(|| solve_error(&equation, var))?;
            solve_polynomial(coefficients).ok_or_else(|| solve_error(&equation, var))?
        }
    };
    let mut roots: Vec<Expr> = Vec::with_capacity(raw.len());
    for root in raw {
        let root = expand(&root);
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::new("test", Duration::from_secs(10))
    }

    #[test]
    fn test_invert_exponential_cdf() {
        let xs = Symbol::new("x");
        let us = Symbol::new("u");
        let cdf = Expr::one() - Expr::exp(Expr::num(-2.0) * Expr::sym(&xs));
        let roots = solve(&cdf, &Expr::sym(&us), &xs, &deadline()).unwrap();
        assert_eq!(roots.len(), 1);
        let expected = -(1.0_f64 - 0.3).ln() / 2.0;
        assert!((roots[0].eval_at(&us, 0.3).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_square_gives_both_roots() {
        let xs = Symbol::new("x");
        let roots = solve(&Expr::powf(Expr::sym(&xs), 2.0), &Expr::symbol("y"), &xs, &deadline()).unwrap();
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn test_quadratic_cdf_piece() {
        // 2x - x^2/2 - 1 = u on [1, 2]
        let xs = Symbol::new("x");
        let us = Symbol::new("u");
        let x = Expr::sym(&xs);
        let piece = Expr::num(2.0) * x.clone() - Expr::num(0.5) * Expr::powf(x, 2.0) - Expr::one();
        let roots = solve(&piece, &Expr::sym(&us), &xs, &deadline()).unwrap();
        assert_eq!(roots.len(), 2);
        let values: Vec<f64> = roots.iter().map(|r| r.eval_at(&us, 0.875).unwrap()).collect();
        assert!(values.iter().any(|v| (v - 1.5).abs() < 1e-9));
    }

    #[test]
    fn test_negative_discriminant_has_no_roots() {
        let xs = Symbol::new("x");
        let x = Expr::sym(&xs);
        let e = Expr::powf(x.clone(), 2.0) + x + Expr::one();
        assert!(solve(&e, &Expr::zero(), &xs, &deadline()).unwrap().is_empty());
    }

    #[test]
    fn test_unsolvable_equation_is_reported() {
        let xs = Symbol::new("x");
        let x = Expr::sym(&xs);
        let e = x.clone() + Expr::exp(x);
        assert!(matches!(solve(&e, &Expr::zero(), &xs, &deadline()), Err(BackendError::Solve { .. })));
    }
}
