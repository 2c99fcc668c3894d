use argmin::core::{
    CostFunction,
    Error,
    Executor,
    State
};
use argmin::solver::brent::BrentRoot;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, Clone, PartialEq)]
pub enum RootFindingError {
    #[error("root is not bracketed by [{lower}, {upper}]")]
    NotBracketed { lower: f64, upper: f64 },
    #[error("root solver failed: {0}")]
    Solver(String),
    #[error("root solver returned no estimate")]
    NoEstimate,
}

struct ScalarEquation<F> {
    f: F,
}

impl<F> CostFunction for ScalarEquation<F>
where
    F: Fn(f64) -> f64,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        Ok((self.f)(*param))
    }
}

/// Root of `f` on `[lower, upper]` by Brent's method; `f(lower)` and
/// `f(upper)` must differ in sign.
pub fn brent_root<F>(f: F, lower: f64, upper: f64, tolerance: f64, max_iters: u64) -> Result<f64, RootFindingError>
where
    F: Fn(f64) -> f64,
{
    let (fa, fb) = (f(lower), f(upper));
    if fa == 0.0 {
        return Ok(lower);
    }
    if fb == 0.0 {
        return Ok(upper);
    }
    if !(fa.is_finite() && fb.is_finite()) || fa.signum() == fb.signum() {
        return Err(RootFindingError::NotBracketed { lower, upper });
    }
    let solver = BrentRoot::new(lower, upper, tolerance);
    let result = Executor::new(ScalarEquation { f }, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(|error| RootFindingError::Solver(error.to_string()))?;
    result.state().get_best_param().copied().ok_or(RootFindingError::NoEstimate)
}

/// Newton–Raphson from `seed`, clamped to `[lower, upper]`. Returns the last
/// iterate and its residual.
pub fn newton<F, D>(f: F, df: D, seed: f64, lower: f64, upper: f64, iterations: usize) -> (f64, f64)
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    let mut x = seed.clamp(lower, upper);
    for _ in 0..iterations {
        let slope = df(x);
        if !slope.is_finite() || slope == 0.0 {
            break;
        }
        let next = (x - f(x) / slope).clamp(lower, upper);
        if !next.is_finite() {
            break;
        }
        x = next;
    }
    (x, f(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brent_finds_square_root() {
        let root = brent_root(|x| x * x - 2.0, 0.0, 2.0, 1e-12, 100).unwrap();
        assert!((root - 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_brent_requires_bracket() {
        let r = brent_root(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 100);
        assert!(matches!(r, Err(RootFindingError::NotBracketed { .. })));
    }

    #[test]
    fn test_newton_converges_on_cdf() {
        let (x, residual) = newton(|x| 1.0 - (-x).exp() - 0.5, |x| (-x).exp(), 1.0, 0.0, 50.0, 10);
        assert!(residual.abs() < 1e-12);
        assert!((x - 2.0_f64.ln()).abs() < 1e-12);
    }
}
