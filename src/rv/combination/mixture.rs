use tracing::debug;

use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::rv::partition::{
    PiecewiseAccumulator,
    merge_breakpoints
};
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::Expr;

impl Engine {
    /// Density `Σ w_i f_i` of a finite mixture.
    ///
    /// Weights must be finite, non-negative and sum to one within
    /// `mixture_tolerance`; every component must share the continuous or
    /// discrete nature of the first.
    pub fn mixture(&self, weights: &[f64], components: &[RandomVariable]) -> Result<RandomVariable, EngineError> {
        if components.is_empty() || weights.len() != components.len() {
            return Err(EngineError::InvalidMixture(format!(
                "{} weights for {} components",
                weights.len(),
                components.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(EngineError::InvalidMixture(format!("weight {w} is not a probability")));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > self.config().mixture_tolerance {
            return Err(EngineError::InvalidMixture(format!("weights sum to {total}")));
        }
        let discrete = components[0].nature().is_discrete();
        if let Some(other) = components.iter().find(|c| c.nature().is_discrete() != discrete) {
            return Err(EngineError::TypeMismatch {
                operation: "mixture",
                left: components[0].nature().to_string(),
                right: other.nature().to_string(),
            });
        }
        let var = components[0].var().clone();

        if discrete {
            let mut pairs = Vec::new();
            for (w, component) in weights.iter().zip(components) {
                for (value, mass) in self.mass_table("mixture", component)? {
                    pairs.push((value, Expr::num(*w) * mass));
                }
            }
            let (pieces, breakpoints) = self.merge_masses(pairs);
            return RandomVariable::with_variable(pieces, breakpoints, Nature::DiscreteExplicit, Form::Pdf, var);
        }

        let mut pdfs = Vec::with_capacity(components.len());
        let mut all_breakpoints = Vec::new();
        for component in components {
            let pdf = self.form_of(component, Form::Pdf)?;
            all_breakpoints.extend(pdf.numeric_breakpoints("mixture")?);
            pdfs.push(pdf);
        }
        let tolerance = self.config().tolerance;
        let cuts = merge_breakpoints(all_breakpoints, tolerance);
        debug!(components = components.len(), intervals = cuts.len() - 1, "mixture on breakpoint union");
        let mut accumulator = PiecewiseAccumulator::new(cuts, tolerance);
        for (w, pdf) in weights.iter().zip(&pdfs) {
            let breakpoints = pdf.numeric_breakpoints("mixture")?;
            for (piece, pair) in pdf.pieces().iter().zip(breakpoints.windows(2)) {
                let weighted = Expr::num(*w) * piece.subs(pdf.var(), &Expr::sym(&var));
                accumulator.add(pair[0], pair[1], weighted);
            }
        }
        let (pieces, breakpoints) = accumulator.finish(self);
        RandomVariable::with_variable(pieces, breakpoints, Nature::Continuous, Form::Pdf, var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(a: f64, b: f64) -> RandomVariable {
        RandomVariable::continuous_pdf(vec![Expr::num(1.0 / (b - a))], vec![Expr::num(a), Expr::num(b)]).unwrap()
    }

    #[test]
    fn test_overlapping_uniforms() {
        let engine = Engine::default();
        let m = engine.mixture(&[0.5, 0.5], &[uniform(0.0, 2.0), uniform(1.0, 3.0)]).unwrap();
        assert_eq!(m.pieces(), &[Expr::num(0.25), Expr::num(0.5), Expr::num(0.25)]);
        assert!((engine.cdf_at(&m, 3.0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_are_validated() {
        let engine = Engine::default();
        let parts = [uniform(0.0, 1.0), uniform(1.0, 2.0)];
        assert!(matches!(engine.mixture(&[0.5, 0.4], &parts), Err(EngineError::InvalidMixture(_))));
        assert!(matches!(engine.mixture(&[1.0], &parts), Err(EngineError::InvalidMixture(_))));
        assert!(matches!(engine.mixture(&[f64::NAN, 1.0], &parts), Err(EngineError::InvalidMixture(_))));
        assert!(engine.mixture(&[0.50004, 0.49999], &parts).is_ok());
    }

    #[test]
    fn test_discrete_values_are_merged() {
        let engine = Engine::default();
        let a = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let b = RandomVariable::discrete_explicit_pdf(vec![1.0], vec![1.0]).unwrap();
        let m = engine.mixture(&[0.5, 0.5], &[a, b]).unwrap();
        assert_eq!(m.breakpoints(), &[Expr::zero(), Expr::one()]);
        assert_eq!(m.pieces(), &[Expr::num(0.25), Expr::num(0.75)]);
    }

    #[test]
    fn test_mixed_natures_are_rejected() {
        let engine = Engine::default();
        let coin = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let r = engine.mixture(&[0.5, 0.5], &[uniform(0.0, 1.0), coin]);
        assert!(matches!(r, Err(EngineError::TypeMismatch { .. })));
    }
}
