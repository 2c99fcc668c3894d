//! Distribution of the `r`-th smallest of `n` draws.

use tracing::debug;

use crate::math::combinatorics::{
    arrangements,
    binomial,
    factorial,
    next_combination,
    next_permutation
};
use crate::math::round::{
    approx_eq,
    snap
};
use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};

/// `P(X_(r) <= x)` in terms of `F = F(x)` when drawing with replacement.
fn at_least_r_below(n: usize, r: usize, big_f: &Expr) -> Expr {
    let terms = (r..=n)
        .map(|j| {
            Expr::Mul(vec![
                Expr::num(binomial(n as u64, j as u64)),
                Expr::powf(big_f.clone(), j as f64),
                Expr::powf(Expr::one() - big_f.clone(), (n - j) as f64),
            ])
        })
        .collect();
    Expr::Add(terms)
}

fn at_least_r_below_value(n: usize, r: usize, big_f: f64) -> f64 {
    (r..=n)
        .map(|j| binomial(n as u64, j as u64) * big_f.powi(j as i32) * (1.0 - big_f).powi((n - j) as i32))
        .sum()
}

impl Engine {
    /// Distribution of the `r`-th order statistic of a sample of size `n`,
    /// drawn with or without replacement.
    pub fn order_stat(&self, rv: &RandomVariable, n: usize, r: usize, replacement: bool) -> Result<RandomVariable, EngineError> {
        if r < 1 || r > n {
            return Err(EngineError::InvalidArgument(format!(
                "order statistic {r} of a sample of {n} needs 1 <= r <= n"
            )));
        }
        let pdf = self.form_of(rv, Form::Pdf)?;
        match (pdf.nature(), replacement) {
            (Nature::Continuous, _) => self.continuous_order_stat(&pdf, n, r),
            (Nature::DiscreteFunctional, true) if pdf.pieces().len() == 1 => self.functional_order_stat(&pdf, n, r),
            (_, true) => {
                let table = self.numeric_table("order_stat", &pdf)?;
                self.order_stat_with_replacement(&table, n, r, pdf.var())
            }
            (_, false) => {
                let table = self.numeric_table("order_stat", &pdf)?;
                self.order_stat_without_replacement(&table, n, r, pdf.var())
            }
        }
    }

    /// `n! / ((r-1)! (n-r)!) F^(r-1) S^(n-r) f` on every piece.
    fn continuous_order_stat(&self, pdf: &RandomVariable, n: usize, r: usize) -> Result<RandomVariable, EngineError> {
        let cdf = self.form_of(pdf, Form::Cdf)?;
        let coefficient = factorial(n as u64) / (factorial(r as u64 - 1) * factorial((n - r) as u64));
        let pieces = pdf
            .pieces()
            .iter()
            .zip(cdf.pieces())
            .map(|(f, big_f)| {
                self.simplify(&Expr::Mul(vec![
                    Expr::num(coefficient),
                    Expr::powf(big_f.clone(), (r - 1) as f64),
                    Expr::powf(Expr::one() - big_f.clone(), (n - r) as f64),
                    f.clone(),
                ]))
            })
            .collect();
        pdf.derive(pieces, pdf.breakpoints().to_vec(), Form::Pdf)
    }

    /// `G(F(x)) - G(F(x - 1))` on a single discrete-functional piece.
    fn functional_order_stat(&self, pdf: &RandomVariable, n: usize, r: usize) -> Result<RandomVariable, EngineError> {
        let cdf = self.form_of(pdf, Form::Cdf)?;
        let var = pdf.var();
        let big_f = &cdf.pieces()[0];
        let previous = big_f.subs(var, &(Expr::sym(var) - Expr::one()));
        let piece = at_least_r_below(n, r, big_f) - at_least_r_below(n, r, &previous);
        pdf.derive(vec![self.simplify(&piece)], pdf.breakpoints().to_vec(), Form::Pdf)
    }

    /// `(value, mass)` pairs with numeric masses.
    fn numeric_table(&self, operation: &'static str, pdf: &RandomVariable) -> Result<Vec<(f64, f64)>, EngineError> {
        self.mass_table(operation, pdf)?
            .into_iter()
            .map(|(value, mass)| match mass.to_f64() {
                Some(m) => Ok((value, m)),
                None => Err(EngineError::unsupported(operation, format!("symbolic mass {mass}"))),
            })
            .collect()
    }

    fn order_stat_with_replacement(
        &self,
        table: &[(f64, f64)],
        n: usize,
        r: usize,
        var: &Symbol,
    ) -> Result<RandomVariable, EngineError> {
        let mut cumulative = Vec::with_capacity(table.len());
        let mut running = 0.0;
        for (_, m) in table {
            running += m;
            cumulative.push(running.min(1.0));
        }
        let last = table.len() - 1;
        let masses: Vec<(f64, Expr)> = table
            .iter()
            .enumerate()
            .map(|(k, (value, _))| {
                let mass = match k {
                    0 if last == 0 => 1.0,
                    0 => at_least_r_below_value(n, r, cumulative[0]),
                    k if k == last => 1.0 - at_least_r_below_value(n, r, cumulative[k - 1]),
                    k => at_least_r_below_value(n, r, cumulative[k]) - at_least_r_below_value(n, r, cumulative[k - 1]),
                };
                (*value, Expr::num(snap(mass)))
            })
            .collect();
        let (pieces, breakpoints) = self.merge_masses(masses);
        RandomVariable::with_variable(pieces, breakpoints, Nature::DiscreteExplicit, Form::Pdf, var.clone())
    }

    fn order_stat_without_replacement(
        &self,
        table: &[(f64, f64)],
        n: usize,
        r: usize,
        var: &Symbol,
    ) -> Result<RandomVariable, EngineError> {
        let size = table.len();
        if n > size {
            return Err(EngineError::InvalidArgument(format!(
                "a sample of {n} without replacement from {size} support values"
            )));
        }
        let tolerance = self.config().tolerance;
        let equally_likely = table.iter().all(|(_, m)| approx_eq(*m, 1.0 / size as f64, tolerance));
        let totals: Vec<f64> = if equally_likely {
            debug!(size, n, r, "order statistic of an equally likely support");
            let total = binomial(size as u64, n as u64);
            (1..=size)
                .map(|k| {
                    binomial(k as u64 - 1, r as u64 - 1) * binomial((size - k) as u64, (n - r) as u64) / total
                })
                .collect()
        } else {
            let count = arrangements(size as u64, n as u64);
            let budget = self.config().permutation_budget;
            if count > budget as f64 {
                return Err(EngineError::unsupported(
                    "order_stat",
                    format!("{count} ordered samples exceed the permutation budget of {budget}"),
                ));
            }
            debug!(size, n, r, count, "enumerating ordered samples");
            enumerate_ordered_samples(table, n, r)
        };
        let masses = table
            .iter()
            .zip(totals)
            .map(|((value, _), mass)| (*value, Expr::num(snap(mass))))
            .collect();
        let (pieces, breakpoints) = self.merge_masses(masses);
        RandomVariable::with_variable(pieces, breakpoints, Nature::DiscreteExplicit, Form::Pdf, var.clone())
    }
}

/// Probability that support index `k` is the `r`-th smallest of an ordered
/// draw of `n` without replacement, each draw renormalizing the remaining
/// masses.
fn enumerate_ordered_samples(table: &[(f64, f64)], n: usize, r: usize) -> Vec<f64> {
    let size = table.len();
    let mut totals = vec![0.0; size];
    let mut subset: Vec<usize> = (0..n).collect();
    loop {
        // the subset is ascending and so is the support
        let target = subset[r - 1];
        let mut order = subset.clone();
        loop {
            let mut probability = 1.0;
            let mut remaining = 1.0;
            for &i in &order {
                if remaining <= 0.0 {
                    probability = 0.0;
                    break;
                }
                probability *= table[i].1 / remaining;
                remaining -= table[i].1;
            }
            totals[target] += probability;
            if !next_permutation(&mut order) {
                break;
            }
        }
        if !next_combination(&mut subset, size) {
            break;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential() -> RandomVariable {
        RandomVariable::continuous_pdf(
            vec![Expr::exp(-Expr::symbol("x"))],
            vec![Expr::zero(), Expr::infinity()],
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_rank() {
        let engine = Engine::default();
        assert!(matches!(engine.order_stat(&exponential(), 3, 0, true), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(engine.order_stat(&exponential(), 3, 4, true), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_minimum_of_three_exponentials() {
        let engine = Engine::default();
        let first = engine.order_stat(&exponential(), 3, 1, true).unwrap();
        // 3 e^{-3x}
        assert!((engine.pdf_at(&first, 0.4).unwrap() - 3.0 * (-1.2_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_median_of_three_uniforms() {
        let engine = Engine::default();
        let uniform = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::zero(), Expr::one()]).unwrap();
        let median = engine.order_stat(&uniform, 3, 2, true).unwrap();
        // 6 x (1 - x)
        assert!((engine.pdf_at(&median, 0.5).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_with_replacement() {
        let engine = Engine::default();
        let coin = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let max = engine.order_stat(&coin, 2, 2, true).unwrap();
        assert_eq!(max.pieces(), &[Expr::num(0.25), Expr::num(0.75)]);
    }

    #[test]
    fn test_equally_likely_without_replacement() {
        let engine = Engine::default();
        let die = RandomVariable::discrete_explicit_pdf(vec![0.25; 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let min = engine.order_stat(&die, 2, 1, false).unwrap();
        // C(4-k, 1) / C(4, 2)
        assert_eq!(min.pieces(), &[Expr::num(0.5), Expr::num(snap(1.0 / 3.0)), Expr::num(snap(1.0 / 6.0)), Expr::zero()]);
    }

    #[test]
    fn test_unequal_masses_without_replacement() {
        let table = [(1.0, 0.5), (2.0, 0.25), (3.0, 0.25)];
        let totals = enumerate_ordered_samples(&table, 2, 2);
        // max of two distinct draws
        let two = 0.5 * (0.25 / 0.5) + 0.25 * (0.5 / 0.75);
        assert!((totals[1] - two).abs() < 1e-12);
        assert!((totals.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_enumeration_budget() {
        let engine = Engine::new(crate::configuration::EngineConfig {
            permutation_budget: 5,
            ..Default::default()
        });
        let rv = RandomVariable::discrete_explicit_pdf(vec![0.1, 0.2, 0.3, 0.4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let r = engine.order_stat(&rv, 3, 1, false);
        assert!(matches!(r, Err(EngineError::Unsupported { .. })));
    }
}
