//! Conversions between the six functional forms, and point queries.
//!
//! Continuous and discrete-functional variables convert through the PDF;
//! discrete-explicit variables convert through their table of masses.

use std::sync::Arc;

use tracing::debug;

use crate::math::round::{
    approx_eq,
    snap
};
use crate::rv::engine::{
    Engine,
    fresh_symbol
};
use crate::rv::engineerror::EngineError;
use crate::rv::partition::interior_point;
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};

fn operation_name(form: Form) -> &'static str {
    match form {
        Form::Pdf => "pdf",
        Form::Cdf => "cdf",
        Form::Sf => "sf",
        Form::Hf => "hf",
        Form::Chf => "chf",
        Form::Idf => "idf",
    }
}

impl Engine {
    pub fn pdf(&self, rv: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.to_form(rv, Form::Pdf)
    }

    pub fn cdf(&self, rv: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.to_form(rv, Form::Cdf)
    }

    pub fn sf(&self, rv: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.to_form(rv, Form::Sf)
    }

    pub fn hf(&self, rv: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.to_form(rv, Form::Hf)
    }

    pub fn chf(&self, rv: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.to_form(rv, Form::Chf)
    }

    pub fn idf(&self, rv: &RandomVariable) -> Result<RandomVariable, EngineError> {
        self.to_form(rv, Form::Idf)
    }

    pub fn pdf_at(&self, rv: &RandomVariable, x: f64) -> Result<f64, EngineError> {
        self.value_of(rv, Form::Pdf, x)
    }

    pub fn cdf_at(&self, rv: &RandomVariable, x: f64) -> Result<f64, EngineError> {
        self.value_of(rv, Form::Cdf, x)
    }

    pub fn sf_at(&self, rv: &RandomVariable, x: f64) -> Result<f64, EngineError> {
        self.value_of(rv, Form::Sf, x)
    }

    pub fn hf_at(&self, rv: &RandomVariable, x: f64) -> Result<f64, EngineError> {
        self.value_of(rv, Form::Hf, x)
    }

    pub fn chf_at(&self, rv: &RandomVariable, x: f64) -> Result<f64, EngineError> {
        self.value_of(rv, Form::Chf, x)
    }

    /// Quantile at probability `u`.
    pub fn idf_at(&self, rv: &RandomVariable, u: f64) -> Result<f64, EngineError> {
        self.value_of(rv, Form::Idf, u)
    }

    pub fn to_form(&self, rv: &RandomVariable, form: Form) -> Result<RandomVariable, EngineError> {
        self.form_of(rv, form).map(|converted| (*converted).clone())
    }

    /// `rv` in `form`, memoized on `rv` when form caching is enabled.
    pub(crate) fn form_of(&self, rv: &RandomVariable, form: Form) -> Result<Arc<RandomVariable>, EngineError> {
        if rv.form() == form {
            return Ok(Arc::new(rv.clone()));
        }
        if self.config().cache_forms {
            if let Some(hit) = rv.cache.get(form) {
                return Ok(hit);
            }
        }
        debug!(from = %rv.form(), to = %form, nature = %rv.nature(), "converting form");
        let converted = match rv.nature() {
            Nature::DiscreteExplicit => self.explicit_to_form(rv, form)?,
            Nature::Continuous | Nature::DiscreteFunctional => self.symbolic_to_form(rv, form)?,
        };
        let converted = Arc::new(converted);
        Ok(if self.config().cache_forms {
            rv.cache.store(form, converted)
        } else {
            converted
        })
    }

    // ─────────────────────────────────────────────
    // Continuous and discrete-functional
    // ─────────────────────────────────────────────

    fn symbolic_to_form(&self, rv: &RandomVariable, form: Form) -> Result<RandomVariable, EngineError> {
        match form {
            Form::Pdf => match rv.form() {
                Form::Pdf => Ok(rv.clone()),
                Form::Cdf => self.cdf_to_pdf(rv),
                Form::Sf => self.cdf_to_pdf(&self.complement(rv, Form::Cdf)?),
                Form::Hf => self.hf_to_pdf(rv),
                Form::Chf => self.chf_to_pdf(rv),
                Form::Idf => self.cdf_to_pdf(&*self.form_of(rv, Form::Cdf)?),
            },
            Form::Cdf => match rv.form() {
                Form::Sf => self.complement(rv, Form::Cdf),
                Form::Idf => self.idf_to_cdf(rv),
                Form::Chf => self.complement(&self.chf_to_sf(rv)?, Form::Cdf),
                _ => self.pdf_to_cdf(&*self.form_of(rv, Form::Pdf)?),
            },
            Form::Sf => match rv.form() {
                Form::Chf => self.chf_to_sf(rv),
                _ => self.complement(&*self.form_of(rv, Form::Cdf)?, Form::Sf),
            },
            Form::Hf => {
                let pdf = self.form_of(rv, Form::Pdf)?;
                let sf = self.form_of(rv, Form::Sf)?;
                self.hazard(&pdf, &sf)
            }
            Form::Chf => match (rv.form(), rv.nature()) {
                (Form::Hf, Nature::Continuous) => self.cumulative_hazard(rv),
                _ => self.sf_to_chf(&*self.form_of(rv, Form::Sf)?),
            },
            Form::Idf => self.cdf_to_idf(&*self.form_of(rv, Form::Cdf)?),
        }
    }

    /// `1 - p` piecewise, e.g. CDF to SF.
    fn complement(&self, rv: &RandomVariable, to: Form) -> Result<RandomVariable, EngineError> {
        let pieces = rv.pieces().iter().map(|p| self.simplify(&(Expr::one() - p.clone()))).collect();
        rv.derive(pieces, rv.breakpoints().to_vec(), to)
    }

    fn sf_to_chf(&self, sf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let pieces = sf.pieces().iter().map(|p| self.simplify(&-Expr::ln(p.clone()))).collect();
        sf.derive(pieces, sf.breakpoints().to_vec(), Form::Chf)
    }

    fn chf_to_sf(&self, chf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let pieces = chf.pieces().iter().map(|p| self.simplify(&Expr::exp(-p.clone()))).collect();
        chf.derive(pieces, chf.breakpoints().to_vec(), Form::Sf)
    }

    fn pdf_to_cdf(&self, pdf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let var = pdf.var();
        let x = Expr::sym(var);
        let breakpoints = pdf.breakpoints();
        let last = pdf.pieces().len() - 1;
        let mut constant = Expr::zero();
        let mut pieces = Vec::with_capacity(pdf.pieces().len());
        match pdf.nature() {
            Nature::Continuous => {
                for (i, f) in pdf.pieces().iter().enumerate() {
                    let integral = self.integrate("cdf", Some(i), f, var, &breakpoints[i], &x)?;
                    let piece = self.simplify(&(constant.clone() + integral));
                    if i < last {
                        constant = self.limit("cdf", Some(i), &piece, var, &breakpoints[i + 1])?;
                    }
                    pieces.push(piece);
                }
            }
            _ => {
                let k = fresh_symbol("k", &[pdf]);
                for (i, f) in pdf.pieces().iter().enumerate() {
                    let term = f.subs(var, &Expr::sym(&k));
                    let partial = self.sum("cdf", Some(i), &term, &k, &breakpoints[i], &x)?;
                    pieces.push(self.simplify(&(constant.clone() + partial)));
                    if i < last {
                        let end = self.simplify(&(breakpoints[i + 1].clone() - Expr::one()));
                        let total = self.sum("cdf", Some(i), &term, &k, &breakpoints[i], &end)?;
                        constant = self.simplify(&(constant + total));
                    }
                }
            }
        }
        pdf.derive(pieces, breakpoints.to_vec(), Form::Cdf)
    }

    fn cdf_to_pdf(&self, cdf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let var = cdf.var();
        let mut pieces = Vec::with_capacity(cdf.pieces().len());
        for (i, big_f) in cdf.pieces().iter().enumerate() {
            let piece = match cdf.nature() {
                Nature::Continuous => self.differentiate("pdf", Some(i), big_f, var)?,
                _ => {
                    let previous = big_f.subs(var, &(Expr::sym(var) - Expr::one()));
                    self.simplify(&(big_f.clone() - previous))
                }
            };
            pieces.push(piece);
        }
        cdf.derive(pieces, cdf.breakpoints().to_vec(), Form::Pdf)
    }

    /// `f / S` (continuous) or `P(X = x) / P(X >= x)` (discrete).
    fn hazard(&self, pdf: &RandomVariable, sf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let pieces = pdf
            .pieces()
            .iter()
            .zip(sf.pieces())
            .map(|(f, s)| {
                let at_risk = match pdf.nature() {
                    Nature::Continuous => s.clone(),
                    _ => s.clone() + f.clone(),
                };
                self.simplify(&(f.clone() / at_risk))
            })
            .collect();
        pdf.derive(pieces, pdf.breakpoints().to_vec(), Form::Hf)
    }

    /// Running integral of a continuous hazard, `H_i(x) = H(b_i) + ∫_{b_i}^x h`.
    fn cumulative_hazard(&self, hf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let var = hf.var();
        let x = Expr::sym(var);
        let breakpoints = hf.breakpoints();
        let last = hf.pieces().len() - 1;
        let mut constant = Expr::zero();
        let mut pieces = Vec::with_capacity(hf.pieces().len());
        for (i, h) in hf.pieces().iter().enumerate() {
            let integral = self.integrate("chf", Some(i), h, var, &breakpoints[i], &x)?;
            let piece = self.simplify(&(constant.clone() + integral));
            if i < last {
                constant = self.limit("chf", Some(i), &piece, var, &breakpoints[i + 1])?;
            }
            pieces.push(piece);
        }
        hf.derive(pieces, breakpoints.to_vec(), Form::Chf)
    }

    fn hf_to_pdf(&self, hf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        if hf.nature() != Nature::Continuous {
            return Err(EngineError::unsupported(
                "pdf",
                "a discrete-functional hazard has no closed-form product; convert the variable to explicit",
            ));
        }
        let chf = self.cumulative_hazard(hf)?;
        let pieces = hf
            .pieces()
            .iter()
            .zip(chf.pieces())
            .map(|(h, big_h)| self.simplify(&(h.clone() * Expr::exp(-big_h.clone()))))
            .collect();
        hf.derive(pieces, hf.breakpoints().to_vec(), Form::Pdf)
    }

    fn chf_to_pdf(&self, chf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        if chf.nature() != Nature::Continuous {
            return self.cdf_to_pdf(&self.complement(&self.chf_to_sf(chf)?, Form::Cdf)?);
        }
        let var = chf.var();
        let mut pieces = Vec::with_capacity(chf.pieces().len());
        for (i, big_h) in chf.pieces().iter().enumerate() {
            let h = self.differentiate("pdf", Some(i), big_h, var)?;
            pieces.push(self.simplify(&(h * Expr::exp(-big_h.clone()))));
        }
        chf.derive(pieces, chf.breakpoints().to_vec(), Form::Pdf)
    }

    /// Value of `expr` at a breakpoint, using limits at infinite ends.
    pub(crate) fn bound_value(
        &self,
        operation: &'static str,
        segment: usize,
        expr: &Expr,
        var: &Symbol,
        point: f64,
    ) -> Result<f64, EngineError> {
        if point.is_infinite() {
            let value = self.limit(operation, Some(segment), expr, var, &Expr::num(point))?;
            return value
                .to_f64()
                .ok_or_else(|| EngineError::unsupported(operation, format!("`{value}` is not numeric")));
        }
        self.value_at(operation, Some(segment), expr, var, point)
    }

    fn cdf_to_idf(&self, cdf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        if cdf.nature() != Nature::Continuous {
            return Err(EngineError::unsupported(
                "idf",
                "the inverse of a discrete-functional variable is tabulated; convert it to explicit first",
            ));
        }
        let var = cdf.var();
        let breakpoints = cdf.numeric_breakpoints("idf")?;
        let u = fresh_symbol("u", &[cdf]);
        let tolerance = self.config().tolerance;
        let mut pieces = Vec::new();
        let mut probabilities: Vec<f64> = Vec::new();
        for (i, big_f) in cdf.pieces().iter().enumerate() {
            let (a, b) = (breakpoints[i], breakpoints[i + 1]);
            let ua = snap(self.bound_value("idf", i, big_f, var, a)?.clamp(0.0, 1.0));
            let ub = snap(self.bound_value("idf", i, big_f, var, b)?.clamp(0.0, 1.0));
            if ub - ua <= tolerance {
                debug!(segment = i, "skipping flat cdf piece");
                continue;
            }
            let candidates = self.solve("idf", Some(i), big_f, &Expr::sym(&u), var)?;
            let inverse = self.select_inverse("idf", i, big_f, var, candidates, &u, interior_point(a, b))?;
            pieces.push(self.simplify(&inverse.subs(&u, &Expr::sym(var))));
            if probabilities.is_empty() {
                probabilities.push(ua);
            }
            probabilities.push(ub);
        }
        if pieces.is_empty() {
            return Err(EngineError::unsupported("idf", "the cdf is flat on its whole support"));
        }
        cdf.derive(pieces, probabilities.into_iter().map(Expr::num).collect(), Form::Idf)
    }

    fn idf_to_cdf(&self, idf: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let var = idf.var();
        let probabilities = idf.numeric_breakpoints("cdf")?;
        let y = fresh_symbol("y", &[idf]);
        let mut pieces = Vec::new();
        let mut breakpoints: Vec<f64> = Vec::new();
        for (i, q) in idf.pieces().iter().enumerate() {
            let (ua, ub) = (probabilities[i], probabilities[i + 1]);
            let xa = snap(self.bound_value("cdf", i, q, var, ua)?);
            let xb = snap(self.bound_value("cdf", i, q, var, ub)?);
            if approx_eq(xa, xb, self.config().tolerance) {
                continue;
            }
            let candidates = self.solve("cdf", Some(i), q, &Expr::sym(&y), var)?;
            let inverse = self.select_inverse("cdf", i, q, var, candidates, &y, interior_point(ua, ub))?;
            pieces.push(self.simplify(&inverse.subs(&y, &Expr::sym(var))));
            if breakpoints.is_empty() {
                breakpoints.push(xa);
            }
            breakpoints.push(xb);
        }
        idf.derive(pieces, breakpoints.into_iter().map(Expr::num).collect(), Form::Cdf)
    }

    // ─────────────────────────────────────────────
    // Discrete-explicit tables
    // ─────────────────────────────────────────────

    /// Simplified, and folded to a number when closed.
    pub(crate) fn tidy(&self, expr: &Expr) -> Expr {
        let simplified = self.simplify(expr);
        match simplified.to_f64() {
            Some(v) if !v.is_nan() => Expr::num(snap(v)),
            _ => simplified,
        }
    }

    /// `(masses, support)` of an explicit variable in any form.
    pub(crate) fn explicit_masses(&self, rv: &RandomVariable) -> (Vec<Expr>, Vec<Expr>) {
        let pieces = rv.pieces();
        let differences = |cumulative: &[Expr]| -> Vec<Expr> {
            cumulative
                .iter()
                .enumerate()
                .map(|(j, c)| match j {
                    0 => self.tidy(c),
                    _ => self.tidy(&(c.clone() - cumulative[j - 1].clone())),
                })
                .collect()
        };
        match rv.form() {
            Form::Pdf => (pieces.to_vec(), rv.breakpoints().to_vec()),
            Form::Cdf => (differences(pieces), rv.breakpoints().to_vec()),
            Form::Sf => {
                let cumulative: Vec<Expr> = pieces.iter().map(|s| Expr::one() - s.clone()).collect();
                (differences(&cumulative), rv.breakpoints().to_vec())
            }
            Form::Chf => {
                let cumulative: Vec<Expr> = pieces.iter().map(|h| Expr::one() - Expr::exp(-h.clone())).collect();
                (differences(&cumulative), rv.breakpoints().to_vec())
            }
            Form::Hf => {
                let mut survive = Expr::one();
                let mut masses = Vec::with_capacity(pieces.len());
                for h in pieces {
                    masses.push(self.tidy(&(h.clone() * survive.clone())));
                    survive = self.tidy(&(survive * (Expr::one() - h.clone())));
                }
                (masses, rv.breakpoints().to_vec())
            }
            Form::Idf => (differences(rv.breakpoints()), pieces.to_vec()),
        }
    }

    fn explicit_to_form(&self, rv: &RandomVariable, form: Form) -> Result<RandomVariable, EngineError> {
        let (masses, support) = self.explicit_masses(rv);
        let mut cumulative = Vec::with_capacity(masses.len());
        let mut running = Expr::zero();
        for m in &masses {
            running = self.tidy(&(running + m.clone()));
            cumulative.push(running.clone());
        }
        let survivor: Vec<Expr> = cumulative.iter().map(|c| self.tidy(&(Expr::one() - c.clone()))).collect();
        let (pieces, breakpoints) = match form {
            Form::Pdf => (masses, support),
            Form::Cdf => (cumulative, support),
            Form::Sf => (survivor, support),
            Form::Hf => {
                let pieces = masses
                    .iter()
                    .zip(&survivor)
                    .map(|(m, s)| self.tidy(&(m.clone() / (s.clone() + m.clone()))))
                    .collect();
                (pieces, support)
            }
            Form::Chf => (survivor.iter().map(|s| self.tidy(&-Expr::ln(s.clone()))).collect(), support),
            Form::Idf => {
                let kept: Vec<usize> = (0..masses.len()).filter(|&j| !masses[j].is_zero()).collect();
                (
                    kept.iter().map(|&j| support[j].clone()).collect(),
                    kept.iter().map(|&j| cumulative[j].clone()).collect(),
                )
            }
        };
        RandomVariable::with_variable(pieces, breakpoints, Nature::DiscreteExplicit, form, rv.var().clone())
    }

    fn explicit_value(&self, table: &RandomVariable, form: Form, x: f64) -> Result<f64, EngineError> {
        let operation = operation_name(form);
        let tolerance = self.config().tolerance;
        if form == Form::Idf {
            if !(0.0..=1.0).contains(&x) {
                return Err(out_of_support(operation, x, 0.0, 1.0));
            }
            let probabilities = table.numeric_breakpoints(operation)?;
            let values = table.numeric_pieces(operation)?;
            let j = probabilities
                .iter()
                .position(|p| *p >= x || approx_eq(*p, x, tolerance))
                .unwrap_or(values.len() - 1);
            return Ok(values[j]);
        }
        let support = table.numeric_breakpoints(operation)?;
        let values = table.numeric_pieces(operation)?;
        let (lower, upper) = (support[0], support[support.len() - 1]);
        if x < lower || x > upper {
            return Err(out_of_support(operation, x, lower, upper));
        }
        match form {
            Form::Pdf | Form::Hf => Ok(support
                .iter()
                .position(|s| approx_eq(*s, x, tolerance))
                .map_or(0.0, |j| values[j])),
            _ => {
                let j = support.partition_point(|s| *s <= x || approx_eq(*s, x, tolerance));
                Ok(values[j.saturating_sub(1)])
            }
        }
    }

    fn value_of(&self, rv: &RandomVariable, form: Form, x: f64) -> Result<f64, EngineError> {
        let operation = operation_name(form);
        let converted = self.form_of(rv, form)?;
        if rv.nature() == Nature::DiscreteExplicit {
            return self.explicit_value(&converted, form, x);
        }
        if form == Form::Idf {
            if !(0.0..=1.0).contains(&x) {
                return Err(out_of_support(operation, x, 0.0, 1.0));
            }
        } else {
            let (lower, upper) = rv.support(operation)?;
            if x < lower || x > upper {
                return Err(out_of_support(operation, x, lower, upper));
            }
        }
        let breakpoints = converted.numeric_breakpoints(operation)?;
        let point = match converted.nature() {
            Nature::DiscreteFunctional => {
                if form == Form::Pdf && x.fract() != 0.0 {
                    return Ok(0.0);
                }
                x.floor()
            }
            _ => x,
        };
        let i = RandomVariable::piece_index(&breakpoints, point).ok_or_else(|| {
            out_of_support(operation, x, breakpoints[0], breakpoints[breakpoints.len() - 1])
        })?;
        self.value_at(operation, Some(i), &converted.pieces()[i], converted.var(), point)
    }
}

fn out_of_support(operation: &'static str, x: f64, lower: f64, upper: f64) -> EngineError {
    EngineError::OutOfSupport {
        operation,
        point: x.to_string(),
        lower: lower.to_string(),
        upper: upper.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::EngineConfig;

    fn exponential(rate: f64) -> RandomVariable {
        let x = Expr::symbol("x");
        RandomVariable::continuous_pdf(
            vec![Expr::num(rate) * Expr::exp(Expr::num(-rate) * x)],
            vec![Expr::zero(), Expr::infinity()],
        )
        .unwrap()
    }

    fn uncached() -> Engine {
        Engine::new(EngineConfig {
            cache_forms: false,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_exponential_cdf_at_one() {
        let engine = Engine::default();
        let value = engine.cdf_at(&exponential(2.0), 1.0).unwrap();
        assert!((value - (1.0 - (-2.0_f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_support() {
        let engine = Engine::default();
        assert!(matches!(
            engine.cdf_at(&exponential(2.0), -1.0),
            Err(EngineError::OutOfSupport { .. })
        ));
        assert!(matches!(
            engine.idf_at(&exponential(2.0), 1.5),
            Err(EngineError::OutOfSupport { .. })
        ));
    }

    #[test]
    fn test_round_trip_through_every_form() {
        let engine = uncached();
        let rv = exponential(2.0);
        for form in [Form::Cdf, Form::Sf, Form::Hf, Form::Chf, Form::Idf] {
            let converted = engine.to_form(&rv, form).unwrap();
            let back = engine.pdf(&converted).unwrap();
            for t in [0.1, 0.7, 2.5] {
                let expected = engine.pdf_at(&rv, t).unwrap();
                let got = engine.pdf_at(&back, t).unwrap();
                assert!((expected - got).abs() < 1e-9, "{form}: {expected} vs {got}");
            }
        }
    }

    #[test]
    fn test_identity_conversion() {
        let engine = Engine::default();
        let rv = exponential(1.0);
        assert_eq!(engine.pdf(&rv).unwrap(), rv);
    }

    #[test]
    fn test_cache_returns_the_same_cdf() {
        let engine = Engine::default();
        let rv = exponential(1.0);
        let first = engine.form_of(&rv, Form::Cdf).unwrap();
        let second = engine.form_of(&rv, Form::Cdf).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_piecewise_cdf_is_continuous() {
        let engine = Engine::default();
        let x = Expr::symbol("x");
        let triangular = RandomVariable::continuous_pdf(
            vec![x.clone(), Expr::num(2.0) - x],
            vec![Expr::zero(), Expr::one(), Expr::num(2.0)],
        )
        .unwrap();
        assert!((engine.cdf_at(&triangular, 1.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((engine.cdf_at(&triangular, 1.5).unwrap() - 0.875).abs() < 1e-12);
        assert!((engine.idf_at(&triangular, 0.875).unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_tables() {
        let engine = Engine::default();
        let rv = RandomVariable::discrete_explicit_pdf(vec![0.2, 0.0, 0.5, 0.3], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((engine.cdf_at(&rv, 3.5).unwrap() - 0.7).abs() < 1e-12);
        assert!((engine.sf_at(&rv, 3.0).unwrap() - 0.3).abs() < 1e-12);
        assert!((engine.hf_at(&rv, 3.0).unwrap() - 0.5 / 0.8).abs() < 1e-12);
        assert_eq!(engine.pdf_at(&rv, 2.5).unwrap(), 0.0);
        assert_eq!(engine.idf_at(&rv, 0.6).unwrap(), 3.0);
        let idf = engine.idf(&rv).unwrap();
        assert_eq!(idf.pieces().len(), 3);
        for form in [Form::Cdf, Form::Sf, Form::Hf, Form::Chf, Form::Idf] {
            let back = engine.pdf(&engine.to_form(&rv, form).unwrap()).unwrap();
            for s in [1.0, 3.0, 4.0] {
                assert!((engine.pdf_at(&back, s).unwrap() - engine.pdf_at(&rv, s).unwrap()).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_discrete_functional_cdf() {
        // geometric: (1/2)^(x+1) on 0, 1, 2, ...
        let engine = Engine::default();
        let x = Expr::symbol("x");
        let pmf = Expr::exp(Expr::num(-std::f64::consts::LN_2) * (x + Expr::one()));
        let rv = RandomVariable::discrete_functional_pdf(vec![pmf], vec![Expr::zero(), Expr::infinity()]).unwrap();
        assert!((engine.cdf_at(&rv, 2.0).unwrap() - 0.875).abs() < 1e-12);
        assert!((engine.cdf_at(&rv, 2.5).unwrap() - 0.875).abs() < 1e-12);
        assert_eq!(engine.pdf_at(&rv, 1.5).unwrap(), 0.0);
        let back = engine.pdf(&engine.cdf(&rv).unwrap()).unwrap();
        assert!((engine.pdf_at(&back, 3.0).unwrap() - 0.0625).abs() < 1e-12);
    }
}
