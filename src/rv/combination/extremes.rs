use tracing::debug;

use crate::rv::combination::combination::Operands;
use crate::rv::combination::convolution::is_lifetime;
use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::rv::partition::{
    interior_point,
    merge_breakpoints
};
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Extreme {
    Minimum,
    Maximum,
}

impl Extreme {
    fn operation(self) -> &'static str {
        match self {
            Extreme::Minimum => "minimum",
            Extreme::Maximum => "maximum",
        }
    }

    /// CDF of the extreme from the operands' CDFs.
    fn combine(self, f1: Expr, f2: Expr) -> Expr {
        match self {
            Extreme::Minimum => Expr::one() - (Expr::one() - f1) * (Expr::one() - f2),
            Extreme::Maximum => f1 * f2,
        }
    }
}

/// The CDF piece of `cdf` in force at `x`, written in `var`: 0 below the
/// support and 1 above it.
fn cdf_piece(cdf: &RandomVariable, breakpoints: &[f64], x: f64, var: &Symbol) -> Expr {
    if x < breakpoints[0] {
        return Expr::zero();
    }
    if x > breakpoints[breakpoints.len() - 1] {
        return Expr::one();
    }
    match RandomVariable::piece_index(breakpoints, x) {
        Some(i) => cdf.pieces()[i].subs(cdf.var(), &Expr::sym(var)),
        None => Expr::one(),
    }
}

impl Engine {
    /// Distribution of `min(X, Y)` for independent `X` and `Y`.
    pub fn minimum(&self, left: &RandomVariable, right: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.extreme(Extreme::Minimum, left, right)
    }

    /// Distribution of `max(X, Y)` for independent `X` and `Y`.
    pub fn maximum(&self, left: &RandomVariable, right: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.extreme(Extreme::Maximum, left, right)
    }

    fn extreme(&self, extreme: Extreme, left: &RandomVariable, right: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let operation = extreme.operation();
        let (f, g) = match self.operands(operation, left, right)? {
            Operands::Discrete(x, y) => {
                return match extreme {
                    Extreme::Minimum => self.combine_tables(&x, &y, left.var(), f64::min),
                    Extreme::Maximum => self.combine_tables(&x, &y, left.var(), f64::max),
                };
            }
            Operands::Continuous(f, g) => (f, g),
        };
        let var = f.var().clone();
        let f_cdf = self.form_of(&f, Form::Cdf)?;
        let g_cdf = self.form_of(&g, Form::Cdf)?;

        if is_lifetime(&f) && is_lifetime(&g) {
            debug!(operation, "extreme of two lifetime variables");
            let piece = extreme.combine(
                f_cdf.pieces()[0].clone(),
                g_cdf.pieces()[0].subs(g_cdf.var(), &Expr::sym(&var)),
            );
            let cdf = RandomVariable::with_variable(
                vec![self.simplify(&piece)],
                vec![Expr::zero(), Expr::infinity()],
                Nature::Continuous,
                Form::Cdf,
                var,
            )?;
            return self.pdf(&cdf);
        }

        let f_bps = f_cdf.numeric_breakpoints(operation)?;
        let g_bps = g_cdf.numeric_breakpoints(operation)?;
        let (f_lo, f_hi) = (f_bps[0], f_bps[f_bps.len() - 1]);
        let (g_lo, g_hi) = (g_bps[0], g_bps[g_bps.len() - 1]);
        let (lower, upper) = match extreme {
            Extreme::Minimum => (f_lo.min(g_lo), f_hi.min(g_hi)),
            Extreme::Maximum => (f_lo.max(g_lo), f_hi.max(g_hi)),
        };
        let cuts = merge_breakpoints(
            f_bps.iter().chain(&g_bps).copied().filter(|b| *b >= lower && *b <= upper),
            self.config().tolerance,
        );
        debug!(operation, lower, upper, intervals = cuts.len() - 1, "extreme on refined support");
        let mut pieces = Vec::with_capacity(cuts.len() - 1);
        for pair in cuts.windows(2) {
            let test = interior_point(pair[0], pair[1]);
            let piece = extreme.combine(
                cdf_piece(&f_cdf, &f_bps, test, &var),
                cdf_piece(&g_cdf, &g_bps, test, &var),
            );
            pieces.push(self.simplify(&piece));
        }
        let cdf = RandomVariable::with_variable(
            pieces,
            cuts.into_iter().map(Expr::num).collect(),
            Nature::Continuous,
            Form::Cdf,
            var,
        )?;
        self.pdf(&cdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential(rate: f64) -> RandomVariable {
        let x = Expr::symbol("x");
        RandomVariable::continuous_pdf(
            vec![Expr::num(rate) * Expr::exp(Expr::num(-rate) * x)],
            vec![Expr::zero(), Expr::infinity()],
        )
        .unwrap()
    }

    fn uniform(a: f64, b: f64) -> RandomVariable {
        RandomVariable::continuous_pdf(vec![Expr::num(1.0 / (b - a))], vec![Expr::num(a), Expr::num(b)]).unwrap()
    }

    #[test]
    fn test_minimum_of_exponentials_is_exponential() {
        let engine = Engine::default();
        let m = engine.minimum(&exponential(1.0), &exponential(2.0)).unwrap();
        assert_eq!(m.form(), Form::Pdf);
        assert!((engine.pdf_at(&m, 0.5).unwrap() - 3.0 * (-1.5_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_maximum_of_overlapping_uniforms() {
        let engine = Engine::default();
        let m = engine.maximum(&uniform(0.0, 2.0), &uniform(1.0, 3.0)).unwrap();
        // support [1, 3]; F = (x/2)(x-1)/2 on [1, 2], (x-1)/2 on [2, 3]
        assert!((engine.cdf_at(&m, 2.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((engine.cdf_at(&m, 3.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((engine.pdf_at(&m, 2.5).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_of_disjoint_uniforms_is_the_lower_one() {
        let engine = Engine::default();
        let m = engine.minimum(&uniform(0.0, 1.0), &uniform(2.0, 3.0)).unwrap();
        assert!((engine.pdf_at(&m, 0.5).unwrap() - 1.0).abs() < 1e-12);
        assert!((engine.cdf_at(&m, 1.0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_maximum() {
        let engine = Engine::default();
        let coin = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let m = engine.maximum(&coin, &coin).unwrap();
        assert_eq!(m.pieces(), &[Expr::num(0.25), Expr::num(0.75)]);
    }
}
