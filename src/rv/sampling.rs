//! Variate generation, empirical variables, and enumeration of
//! discrete-functional variables.

use rand::Rng;
use tracing::{
    debug,
    warn
};

use crate::math::rootfinding::{
    brent_root,
    newton
};
use crate::math::round::snap;
use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::rv::partition::interior_point;
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::Expr;

/// Doublings tried when widening a bracket or stepping through integers.
const MAX_DOUBLINGS: usize = 1024;

/// Support points `convert` is willing to enumerate.
const MAX_ENUMERATED_POINTS: f64 = 1e6;

const BRENT_ITERATIONS: u64 = 200;

/// Finite `[a, b]` inside `[lower, upper]` with `f(a) <= 0 <= f(b)`, for an
/// increasing `f`.
fn finite_bracket(f: &impl Fn(f64) -> f64, seed: f64, lower: f64, upper: f64) -> Option<(f64, f64)> {
    let widen = |toward: f64, done: &dyn Fn(f64) -> bool| -> Option<f64> {
        if toward.is_finite() {
            return Some(toward);
        }
        let mut step = 1.0;
        for _ in 0..MAX_DOUBLINGS {
            let candidate = seed + toward.signum() * step;
            if done(f(candidate)) {
                return Some(candidate);
            }
            step *= 2.0;
        }
        None
    };
    let a = widen(lower, &|v: f64| v <= 0.0)?;
    let b = widen(upper, &|v: f64| v >= 0.0)?;
    Some((a, b))
}

impl Engine {
    /// The value `x` with `F(x) = u`.
    ///
    /// Continuous variables start Newton–Raphson at the mean and refine with
    /// Brent's method when the residual stays above `newton_tolerance`.
    pub fn variate_at(&self, rv: &RandomVariable, u: f64) -> Result<f64, EngineError> {
        if !(0.0..=1.0).contains(&u) {
            return Err(EngineError::OutOfSupport {
                operation: "variate",
                point: u.to_string(),
                lower: "0".to_owned(),
                upper: "1".to_owned(),
            });
        }
        match rv.nature() {
            Nature::DiscreteExplicit => self.idf_at(rv, u),
            Nature::DiscreteFunctional => self.functional_quantile(rv, u),
            Nature::Continuous => self.continuous_quantile(rv, u),
        }
    }

    /// `n` draws by inversion of uniform variates from `rng`.
    pub fn variate<R: Rng + ?Sized>(&self, rv: &RandomVariable, n: usize, rng: &mut R) -> Result<Vec<f64>, EngineError> {
        (0..n).map(|_| self.variate_at(rv, rng.random::<f64>())).collect()
    }

    fn continuous_quantile(&self, rv: &RandomVariable, u: f64) -> Result<f64, EngineError> {
        let (lower, upper) = rv.support("variate")?;
        if u == 0.0 {
            return Ok(lower);
        }
        if u == 1.0 {
            return Ok(upper);
        }
        let cdf = self.form_of(rv, Form::Cdf)?;
        let pdf = self.form_of(rv, Form::Pdf)?;
        let residual = |x: f64| self.cdf_at(&cdf, x).map_or(f64::NAN, |p| p - u);
        let slope = |x: f64| self.pdf_at(&pdf, x).unwrap_or(f64::NAN);
        let seed = self
            .mean(rv)
            .ok()
            .and_then(|m| m.to_f64())
            .filter(|m| m.is_finite() && *m >= lower && *m <= upper)
            .unwrap_or_else(|| interior_point(lower, upper));

        let tolerance = self.config().newton_tolerance;
        let (x, r) = newton(&residual, &slope, seed, lower, upper, self.config().newton_iterations);
        if r.abs() <= tolerance {
            return Ok(x);
        }
        warn!(u, x, residual = r, "newton-raphson did not converge, refining with brent");
        let (a, b) = finite_bracket(&residual, seed, lower, upper).ok_or_else(|| EngineError::NonConvergence {
            operation: "variate",
            detail: format!("no finite bracket for u = {u}"),
        })?;
        brent_root(&residual, a, b, tolerance, BRENT_ITERATIONS).map_err(|e| {
            warn!(u, error = %e, "brent refinement failed");
            EngineError::NonConvergence {
                operation: "variate",
                detail: e.to_string(),
            }
        })
    }

    /// Smallest support integer `k` with `F(k) >= u`.
    fn functional_quantile(&self, rv: &RandomVariable, u: f64) -> Result<f64, EngineError> {
        let (lower, upper) = rv.support("variate")?;
        if !lower.is_finite() {
            return Err(EngineError::unsupported("variate", "a support without a lowest integer"));
        }
        let cdf = self.form_of(rv, Form::Cdf)?;
        let tolerance = self.config().tolerance;
        let reaches = |k: f64| -> Result<bool, EngineError> { Ok(self.cdf_at(&cdf, k)? >= u - tolerance) };
        if reaches(lower)? {
            return Ok(lower);
        }
        // exponential search, then bisection on the integers
        let (mut below, mut above) = (lower, None);
        let mut step = 1.0;
        for _ in 0..MAX_DOUBLINGS {
            let k = (lower + step).min(upper);
            if reaches(k)? {
                above = Some(k);
                break;
            }
            if k >= upper {
                return Ok(upper);
            }
            below = k;
            step *= 2.0;
        }
        let mut above = above.ok_or_else(|| EngineError::NonConvergence {
            operation: "variate",
            detail: format!("no support integer reaches u = {u}"),
        })?;
        while above - below > 1.0 {
            let middle = ((below + above) / 2.0).floor();
            if reaches(middle)? {
                above = middle;
            } else {
                below = middle;
            }
        }
        Ok(above)
    }

    /// Discrete-explicit PDF of the empirical distribution of `sample`.
    pub fn bootstrap_rv(&self, sample: &[f64]) -> Result<RandomVariable, EngineError> {
        if sample.is_empty() {
            return Err(EngineError::InvalidArgument("an empty sample".to_owned()));
        }
        if let Some(x) = sample.iter().find(|x| !x.is_finite()) {
            return Err(EngineError::InvalidArgument(format!("sample value {x} is not finite")));
        }
        let weight = 1.0 / sample.len() as f64;
        let pairs = sample.iter().map(|x| (*x, Expr::num(weight))).collect();
        let (pieces, breakpoints) = self.merge_masses(pairs);
        RandomVariable::new(pieces, breakpoints, Nature::DiscreteExplicit, Form::Pdf)
    }

    /// Discrete-explicit PDF of a discrete-functional variable, tabulated at
    /// `lower, lower + increment, ...` up to the upper bound.
    pub fn convert(&self, rv: &RandomVariable, increment: f64) -> Result<RandomVariable, EngineError> {
        if !(increment > 0.0 && increment.is_finite()) {
            return Err(EngineError::InvalidArgument(format!("increment {increment} must be positive")));
        }
        let pdf = self.form_of(rv, Form::Pdf)?;
        match pdf.nature() {
            Nature::DiscreteExplicit => return Ok((*pdf).clone()),
            Nature::Continuous => {
                return Err(EngineError::unsupported("convert", "a continuous variable has no enumerated form"));
            }
            Nature::DiscreteFunctional => {}
        }
        if !pdf.is_bounded() {
            return Err(EngineError::unsupported("convert", "unbounded support cannot be enumerated"));
        }
        let breakpoints = pdf.numeric_breakpoints("convert")?;
        let (lower, upper) = (breakpoints[0], breakpoints[breakpoints.len() - 1]);
        let count = ((upper - lower) / increment + 1e-9).floor() + 1.0;
        if count > MAX_ENUMERATED_POINTS {
            return Err(EngineError::unsupported("convert", format!("{count} support points")));
        }
        debug!(lower, upper, increment, count, "enumerating a discrete-functional variable");
        let mut masses = Vec::with_capacity(count as usize);
        let mut support = Vec::with_capacity(count as usize);
        for j in 0..count as usize {
            let point = snap(lower + j as f64 * increment);
            let i = RandomVariable::piece_index(&breakpoints, point).unwrap_or(pdf.pieces().len() - 1);
            let mass = self.value_at("convert", Some(i), &pdf.pieces()[i], pdf.var(), point)?;
            masses.push(Expr::num(snap(mass)));
            support.push(Expr::num(point));
        }
        RandomVariable::with_variable(masses, support, Nature::DiscreteExplicit, Form::Pdf, pdf.var().clone())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn exponential() -> RandomVariable {
        RandomVariable::continuous_pdf(
            vec![Expr::num(2.0) * Expr::exp(Expr::num(-2.0) * Expr::symbol("x"))],
            vec![Expr::zero(), Expr::infinity()],
        )
        .unwrap()
    }

    #[test]
    fn test_continuous_quantile() {
        let engine = Engine::default();
        let x = engine.variate_at(&exponential(), 0.5).unwrap();
        assert!((x - 2.0_f64.ln() / 2.0).abs() < 1e-9);
        assert_eq!(engine.variate_at(&exponential(), 0.0).unwrap(), 0.0);
        assert!(matches!(engine.variate_at(&exponential(), 1.5), Err(EngineError::OutOfSupport { .. })));
    }

    #[test]
    fn test_brent_fallback_with_no_newton_steps() {
        let engine = Engine::new(crate::configuration::EngineConfig {
            newton_iterations: 0,
            ..Default::default()
        });
        let x = engine.variate_at(&exponential(), 0.99).unwrap();
        assert!((x - 100.0_f64.ln() / 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_functional_quantile() {
        let engine = Engine::default();
        let geometric =
            RandomVariable::from_strings(&["(1/2)^x"], &["1", "inf"], Nature::DiscreteFunctional, Form::Pdf, "x")
                .unwrap();
        assert_eq!(engine.variate_at(&geometric, 0.5).unwrap(), 1.0);
        assert_eq!(engine.variate_at(&geometric, 0.8).unwrap(), 3.0);
        assert_eq!(engine.variate_at(&geometric, 0.99).unwrap(), 7.0);
    }

    #[test]
    fn test_seeded_variates_stay_in_support() {
        let engine = Engine::default();
        let die = RandomVariable::discrete_explicit_pdf(vec![0.25; 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let draws = engine.variate(&die, 50, &mut rng).unwrap();
        assert_eq!(draws.len(), 50);
        assert!(draws.iter().all(|d| [1.0, 2.0, 3.0, 4.0].contains(d)));
    }

    #[test]
    fn test_bootstrap_counts_frequencies() {
        let engine = Engine::default();
        let rv = engine.bootstrap_rv(&[3.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(rv.breakpoints(), &[Expr::one(), Expr::num(2.0), Expr::num(3.0)]);
        assert_eq!(rv.pieces(), &[Expr::num(0.25), Expr::num(0.25), Expr::num(0.5)]);
        assert!(matches!(engine.bootstrap_rv(&[]), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_convert_bounded_functional() {
        let engine = Engine::default();
        let rv = RandomVariable::from_strings(&["x/10"], &["1", "4"], Nature::DiscreteFunctional, Form::Pdf, "x").unwrap();
        let table = engine.convert(&rv, 1.0).unwrap();
        assert_eq!(table.nature(), Nature::DiscreteExplicit);
        assert_eq!(table.pieces(), &[Expr::num(0.1), Expr::num(0.2), Expr::num(0.3), Expr::num(0.4)]);
        let unbounded =
            RandomVariable::from_strings(&["(1/2)^x"], &["1", "inf"], Nature::DiscreteFunctional, Form::Pdf, "x")
                .unwrap();
        assert!(matches!(engine.convert(&unbounded, 1.0), Err(EngineError::Unsupported { .. })));
    }
}
