//! Sums, products and extremes of `n` independent copies of one variable.

use tracing::debug;

use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::Expr;

fn check_count(operation: &str, n: usize) -> Result<(), EngineError> {
    if n == 0 {
        return Err(EngineError::InvalidArgument(format!("{operation} needs at least one copy")));
    }
    Ok(())
}

impl Engine {
    fn fold_copies(
        &self,
        rv: &RandomVariable,
        n: usize,
        combine: impl Fn(&Engine, &RandomVariable, &RandomVariable) -> Result<RandomVariable, EngineError>,
    ) -> Result<RandomVariable, EngineError> {
        let mut total = self.to_form(rv, Form::Pdf)?;
        for _ in 1..n {
            total = combine(self, &total, rv)?;
        }
        Ok(total)
    }

    pub fn convolution_iid(&self, rv: &RandomVariable, n: usize) -> Result<RandomVariable, EngineError> {
        check_count("convolution_iid", n)?;
        self.fold_copies(rv, n, Engine::convolution)
    }

    pub fn product_iid(&self, rv: &RandomVariable, n: usize) -> Result<RandomVariable, EngineError> {
        check_count("product_iid", n)?;
        self.fold_copies(rv, n, Engine::product)
    }

    /// `F^n` for continuous variables, pairwise maxima otherwise.
    pub fn maximum_iid(&self, rv: &RandomVariable, n: usize) -> Result<RandomVariable, EngineError> {
        check_count("maximum_iid", n)?;
        if rv.nature() != Nature::Continuous {
            return self.fold_copies(rv, n, Engine::maximum);
        }
        debug!(n, "maximum of iid copies through the cdf");
        let cdf = self.form_of(rv, Form::Cdf)?;
        let pieces = cdf.pieces().iter().map(|p| self.simplify(&Expr::powf(p.clone(), n as f64))).collect();
        self.pdf(&cdf.derive(pieces, cdf.breakpoints().to_vec(), Form::Cdf)?)
    }

    /// `1 - S^n` for continuous variables, pairwise minima otherwise.
    pub fn minimum_iid(&self, rv: &RandomVariable, n: usize) -> Result<RandomVariable, EngineError> {
        check_count("minimum_iid", n)?;
        if rv.nature() != Nature::Continuous {
            return self.fold_copies(rv, n, Engine::minimum);
        }
        debug!(n, "minimum of iid copies through the survivor function");
        let sf = self.form_of(rv, Form::Sf)?;
        let pieces = sf.pieces().iter().map(|p| self.simplify(&Expr::powf(p.clone(), n as f64))).collect();
        self.pdf(&sf.derive(pieces, sf.breakpoints().to_vec(), Form::Sf)?)
    }
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
    fn test_zero_copies() {
        let engine = Engine::default();
        assert!(matches!(engine.convolution_iid(&exponential(), 0), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_gamma_from_three_exponentials() {
        let engine = Engine::default();
        let gamma = engine.convolution_iid(&exponential(), 3).unwrap();
        // z^2 e^{-z} / 2
        let z: f64 = 1.7;
        assert!((engine.pdf_at(&gamma, z).unwrap() - z * z * (-z).exp() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_iid_matches_first_order_statistic() {
        let engine = Engine::default();
        let min = engine.minimum_iid(&exponential(), 4).unwrap();
        let first = engine.order_stat(&exponential(), 4, 1, true).unwrap();
        for x in [0.1, 0.5, 2.0] {
            assert!((engine.pdf_at(&min, x).unwrap() - engine.pdf_at(&first, x).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_discrete_maximum_iid() {
        let engine = Engine::default();
        let coin = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let max = engine.maximum_iid(&coin, 3).unwrap();
        assert_eq!(max.pieces(), &[Expr::num(0.125), Expr::num(0.875)]);
    }
}
