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
use crate::symbolic::expr::{
    Expr,
    Symbol
};

impl Engine {
    /// `E[g(X)]`, with `g` written in the variable of `rv`; `None` is the
    /// identity. The result stays symbolic when `rv` has free parameters.
    pub fn expected_value(&self, rv: &RandomVariable, g: Option<&Expr>) -> Result<Expr, EngineError> {
        let pdf = self.form_of(rv, Form::Pdf)?;
        let var = pdf.var();
        let g = g.cloned().unwrap_or_else(|| Expr::sym(var));
        let breakpoints = pdf.breakpoints();
        let last = pdf.pieces().len() - 1;
        let mut parts = Vec::with_capacity(pdf.pieces().len());
        match pdf.nature() {
            Nature::Continuous => {
                for (i, f) in pdf.pieces().iter().enumerate() {
                    let integrand = self.simplify(&(g.clone() * f.clone()));
                    parts.push(self.integrate(
                        "expected_value",
                        Some(i),
                        &integrand,
                        var,
                        &breakpoints[i],
                        &breakpoints[i + 1],
                    )?);
                }
            }
            Nature::DiscreteFunctional => {
                let k = fresh_symbol("k", &[&pdf]);
                for (i, f) in pdf.pieces().iter().enumerate() {
                    let term = self.simplify(&(g.clone() * f.clone()).subs(var, &Expr::sym(&k)));
                    let end = if i < last {
                        self.simplify(&(breakpoints[i + 1].clone() - Expr::one()))
                    } else {
                        breakpoints[i + 1].clone()
                    };
                    parts.push(self.sum("expected_value", Some(i), &term, &k, &breakpoints[i], &end)?);
                }
            }
            Nature::DiscreteExplicit => {
                let (masses, support) = self.explicit_masses(&pdf);
                for (mass, point) in masses.into_iter().zip(support) {
                    parts.push(g.subs(var, &point) * mass);
                }
            }
        }
        Ok(self.tidy(&Expr::Add(parts)))
    }

    pub fn mean(&self, rv: &RandomVariable) -> Result<Expr, EngineError> {
        self.expected_value(rv, None)
    }

    /// `E[X^k]`.
    fn raw_moment(&self, rv: &RandomVariable, k: u32) -> Result<Expr, EngineError> {
        let x = Expr::sym(rv.var());
        self.expected_value(rv, Some(&Expr::powf(x, k as f64)))
    }

    pub fn variance(&self, rv: &RandomVariable) -> Result<Expr, EngineError> {
        let mu = self.mean(rv)?;
        let second = self.raw_moment(rv, 2)?;
        Ok(self.tidy(&(second - Expr::powf(mu, 2.0))))
    }

    /// `E[(X - μ)^3] / σ^3`.
    pub fn skewness(&self, rv: &RandomVariable) -> Result<Expr, EngineError> {
        let mu = self.mean(rv)?;
        let second = self.raw_moment(rv, 2)?;
        let third = self.raw_moment(rv, 3)?;
        let variance = second.clone() - Expr::powf(mu.clone(), 2.0);
        let central = third - Expr::num(3.0) * mu.clone() * second + Expr::num(2.0) * Expr::powf(mu, 3.0);
        Ok(self.tidy(&(central * Expr::powf(variance, -1.5))))
    }

    /// `E[(X - μ)^4] / σ^4`, not in excess of 3.
    pub fn kurtosis(&self, rv: &RandomVariable) -> Result<Expr, EngineError> {
        let mu = self.mean(rv)?;
        let second = self.raw_moment(rv, 2)?;
        let third = self.raw_moment(rv, 3)?;
        let fourth = self.raw_moment(rv, 4)?;
        let variance = second.clone() - Expr::powf(mu.clone(), 2.0);
        let central = fourth - Expr::num(4.0) * mu.clone() * third + Expr::num(6.0) * Expr::powf(mu.clone(), 2.0) * second
            - Expr::num(3.0) * Expr::powf(mu, 4.0);
        Ok(self.tidy(&(central * Expr::powf(variance, -2.0))))
    }

    /// `M(t) = E[e^{tX}]` as an expression in `t`.
    pub fn mgf(&self, rv: &RandomVariable, t: &Symbol) -> Result<Expr, EngineError> {
        let g = Expr::exp(Expr::sym(t) * Expr::sym(rv.var()));
        self.expected_value(rv, Some(&g))
    }

    pub fn mgf_at(&self, rv: &RandomVariable, t: f64) -> Result<f64, EngineError> {
        let g = Expr::exp(Expr::num(t) * Expr::sym(rv.var()));
        let value = self.expected_value(rv, Some(&g))?;
        value
            .to_f64()
            .ok_or_else(|| EngineError::unsupported("mgf", format!("`{value}` has free parameters")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(e: Expr) -> f64 {
        e.to_f64().unwrap()
    }

    fn exponential(rate: f64) -> RandomVariable {
        RandomVariable::continuous_pdf(
            vec![Expr::num(rate) * Expr::exp(Expr::num(-rate) * Expr::symbol("x"))],
            vec![Expr::zero(), Expr::infinity()],
        )
        .unwrap()
    }

    #[test]
    fn test_exponential_moments() {
        let engine = Engine::default();
        let x = exponential(2.0);
        assert!((value(engine.mean(&x).unwrap()) - 0.5).abs() < 1e-12);
        assert!((value(engine.variance(&x).unwrap()) - 0.25).abs() < 1e-12);
        assert!((value(engine.skewness(&x).unwrap()) - 2.0).abs() < 1e-9);
        assert!((value(engine.kurtosis(&x).unwrap()) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_moments() {
        let engine = Engine::default();
        let u = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::zero(), Expr::one()]).unwrap();
        assert!((value(engine.variance(&u).unwrap()) - 1.0 / 12.0).abs() < 1e-12);
        assert!(value(engine.skewness(&u).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_expected_value_of_a_function() {
        let engine = Engine::default();
        let die = RandomVariable::discrete_explicit_pdf(vec![0.25; 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let g = Expr::powf(Expr::symbol("x"), 2.0);
        assert!((value(engine.expected_value(&die, Some(&g)).unwrap()) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_mean() {
        let engine = Engine::default();
        let geometric =
            RandomVariable::from_strings(&["(1/2)^x"], &["1", "inf"], Nature::DiscreteFunctional, Form::Pdf, "x")
                .unwrap();
        assert!((value(engine.mean(&geometric).unwrap()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mgf_of_exponential() {
        let engine = Engine::default();
        // λ / (λ - t)
        assert!((engine.mgf_at(&exponential(2.0), 1.0).unwrap() - 2.0).abs() < 1e-12);
        let u = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::zero(), Expr::one()]).unwrap();
        let t = Symbol::new("t");
        let m = engine.mgf(&u, &t).unwrap();
        assert!((m.eval_at(&t, 1.0).unwrap() - (std::f64::consts::E - 1.0)).abs() < 1e-12);
    }
}
