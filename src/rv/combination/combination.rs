//! Operand preparation shared by the two-variable operations.

use std::sync::Arc;

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

/// Both operands of a binary operation, in the representation the
/// operation works on.
pub(crate) enum Operands {
    Continuous(Arc<RandomVariable>, Arc<RandomVariable>),
    Discrete(Vec<(f64, Expr)>, Vec<(f64, Expr)>),
}

impl Engine {
    pub(crate) fn operands(
        &self,
        operation: &'static str,
        left: &RandomVariable,
        right: &RandomVariable,
    ) -> Result<Operands, EngineError> {
        match (left.nature().is_discrete(), right.nature().is_discrete()) {
            (false, false) => Ok(Operands::Continuous(
                self.form_of(left, Form::Pdf)?,
                self.form_of(right, Form::Pdf)?,
            )),
            (true, true) => Ok(Operands::Discrete(
                self.mass_table(operation, left)?,
                self.mass_table(operation, right)?,
            )),
            _ => Err(EngineError::TypeMismatch {
                operation,
                left: left.nature().to_string(),
                right: right.nature().to_string(),
            }),
        }
    }

    /// `(support value, mass)` pairs of a discrete variable. A bounded
    /// discrete-functional variable is enumerated on the integers first.
    pub(crate) fn mass_table(&self, operation: &'static str, rv: &RandomVariable) -> Result<Vec<(f64, Expr)>, EngineError> {
        let pdf = self.form_of(rv, Form::Pdf)?;
        let explicit = match pdf.nature() {
            Nature::DiscreteExplicit => pdf,
            Nature::DiscreteFunctional => {
                if !pdf.is_bounded() {
                    return Err(EngineError::unsupported(
                        operation,
                        "a discrete-functional operand with unbounded support",
                    ));
                }
                Arc::new(self.convert(&pdf, 1.0)?)
            }
            Nature::Continuous => {
                return Err(EngineError::TypeMismatch {
                    operation,
                    left: Nature::Continuous.to_string(),
                    right: Nature::DiscreteExplicit.to_string(),
                });
            }
        };
        let (masses, support) = self.explicit_masses(&explicit);
        masses
            .into_iter()
            .zip(support)
            .map(|(mass, point)| match point.to_f64() {
                Some(value) => Ok((value, mass)),
                None => Err(EngineError::unsupported(operation, format!("symbolic support value {point}"))),
            })
            .collect()
    }

    /// Distribution of `op(X, Y)` for independent tabulated operands.
    pub(crate) fn combine_tables(
        &self,
        left: &[(f64, Expr)],
        right: &[(f64, Expr)],
        var: &Symbol,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<RandomVariable, EngineError> {
        let mut pairs = Vec::with_capacity(left.len() * right.len());
        for (s, m) in left {
            for (t, n) in right {
                pairs.push((op(*s, *t), m.clone() * n.clone()));
            }
        }
        let (pieces, breakpoints) = self.merge_masses(pairs);
        RandomVariable::with_variable(pieces, breakpoints, Nature::DiscreteExplicit, Form::Pdf, var.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_natures_are_rejected() {
        let engine = Engine::default();
        let continuous = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::zero(), Expr::one()]).unwrap();
        let discrete = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let r = engine.operands("convolution", &continuous, &discrete);
        assert!(matches!(r, Err(EngineError::TypeMismatch { .. })));
    }

    #[test]
    fn test_unbounded_functional_operand_is_unsupported() {
        let engine = Engine::default();
        let geometric = RandomVariable::from_strings(&["(1/2)^x"], &["1", "inf"], Nature::DiscreteFunctional, Form::Pdf, "x")
            .unwrap();
        let r = engine.mass_table("product", &geometric);
        assert!(matches!(r, Err(EngineError::Unsupported { .. })));
    }

    #[test]
    fn test_bounded_functional_operand_is_enumerated() {
        let engine = Engine::default();
        let die = RandomVariable::from_strings(&["1/4"], &["1", "4"], Nature::DiscreteFunctional, Form::Pdf, "x").unwrap();
        let table = engine.mass_table("product", &die).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table[3], (4.0, Expr::num(0.25)));
    }
}
