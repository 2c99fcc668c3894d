use tracing::debug;

use crate::rv::combination::combination::Operands;
use crate::rv::engine::{
    Engine,
    fresh_symbol
};
use crate::rv::engineerror::EngineError;
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::rv::transform::Mapping;
use crate::symbolic::expr::Expr;

/// Whether a PDF is one piece on `[0, inf)`.
pub(crate) fn is_lifetime(pdf: &RandomVariable) -> bool {
    pdf.pieces().len() == 1
        && pdf.breakpoints()[0].to_f64() == Some(0.0)
        && pdf.breakpoints()[1].infinite_sign() == Some(1)
}

impl Engine {
    /// Distribution of `X + Y` for independent `X` and `Y`.
    pub fn convolution(&self, left: &RandomVariable, right: &RandomVariable) -> Result<RandomVariable, EngineError> {
        match self.operands("convolution", left, right)? {
            Operands::Discrete(x, y) => self.combine_tables(&x, &y, left.var(), |s, t| s + t),
            Operands::Continuous(f, g) => {
                if is_lifetime(&f) && is_lifetime(&g) {
                    debug!("convolution of two lifetime densities");
                    self.lifetime_convolution(&f, &g)
                } else {
                    debug!("convolution through exp, product and ln");
                    self.log_product_convolution(&f, &g)
                }
            }
        }
    }

    /// `h(z) = ∫_0^z f(x) g(z - x) dx` on `[0, inf)`.
    fn lifetime_convolution(&self, f: &RandomVariable, g: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let z = f.var().clone();
        let x = fresh_symbol("t", &[f, g]);
        let left = f.pieces()[0].subs(f.var(), &Expr::sym(&x));
        let right = g.pieces()[0].subs(g.var(), &(Expr::sym(&z) - Expr::sym(&x)));
        let integrand = self.simplify(&(left * right));
        let density = self.integrate("convolution", Some(0), &integrand, &x, &Expr::zero(), &Expr::sym(&z))?;
        RandomVariable::with_variable(
            vec![self.simplify(&density)],
            vec![Expr::zero(), Expr::infinity()],
            Nature::Continuous,
            Form::Pdf,
            z,
        )
    }

    /// `X + Y = ln(e^X e^Y)`.
    fn log_product_convolution(&self, f: &RandomVariable, g: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let exp_of = |rv: &RandomVariable| Mapping::single(Expr::exp(Expr::sym(rv.var())), rv.var().clone());
        let ex = self.transform(f, &exp_of(f))?;
        let ey = self.transform(g, &exp_of(g))?;
        let product = self.product(&ex, &ey)?;
        let v = product.var().clone();
        let ln = Mapping::new(vec![Expr::ln(Expr::sym(&v))], vec![Expr::zero(), Expr::infinity()], v)?;
        self.transform(&product, &ln)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_of_two_dice() {
        let engine = Engine::default();
        let die = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![1.0, 2.0]).unwrap();
        let sum = engine.convolution(&die, &die).unwrap();
        assert_eq!(sum.breakpoints(), &[Expr::num(2.0), Expr::num(3.0), Expr::num(4.0)]);
        assert_eq!(sum.pieces(), &[Expr::num(0.25), Expr::num(0.5), Expr::num(0.25)]);
    }

    #[test]
    fn test_sum_of_exponentials_is_erlang() {
        let engine = Engine::default();
        let exponential =
            RandomVariable::from_strings(&["exp(-x)"], &["0", "inf"], Nature::Continuous, Form::Pdf, "x").unwrap();
        let erlang = engine.convolution(&exponential, &exponential).unwrap();
        // z e^{-z}
        let expected = 1.5 * (-1.5_f64).exp();
        assert!((engine.pdf_at(&erlang, 1.5).unwrap() - expected).abs() < 1e-12);
    }
}
