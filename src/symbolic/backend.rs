use std::collections::HashMap;
use std::time::{
    Duration,
    Instant
};

use thiserror::Error;

use crate::symbolic::calculus::{
    definite_integral,
    differentiate,
    limit
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};
use crate::symbolic::simplify::expand;
use crate::symbolic::solve::solve;
use crate::symbolic::summation::sum;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("no closed-form integral of `{expr}` in {var}")]
    Integration { expr: String, var: String },
    #[error("no closed-form sum of `{expr}` over {var}")]
    Summation { expr: String, var: String },
    #[error("cannot solve `{equation}` for {var}")]
    Solve { equation: String, var: String },
    #[error("cannot take the limit of `{expr}` as {var} -> {point}")]
    Limit { expr: String, var: String, point: String },
    #[error("`{expr}` diverges as {var} -> {point}")]
    Divergent { expr: String, var: String, point: String },
    #[error("{operation} exceeded its budget of {budget_ms} ms")]
    Timeout { operation: String, budget_ms: u64 },
}

/// Wall-clock budget for one backend call.
#[derive(Clone, Debug)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
    operation: &'static str,
}

impl Deadline {
    pub fn new(operation: &'static str, budget: Duration) -> Deadline {
        Deadline {
            start: Instant::now(),
            budget,
            operation,
        }
    }

    pub fn check(&self) -> Result<(), BackendError> {
        if self.start.elapsed() > self.budget {
            return Err(BackendError::Timeout {
                operation: self.operation.to_owned(),
                budget_ms: self.budget.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Symbolic services the probability engine is written against.
///
/// `upper` of [`SymbolicBackend::integrate`] may be the integration variable
/// itself, which yields the running integral from `lower`.
pub trait SymbolicBackend: Send + Sync {
    fn simplify(&self, expr: &Expr) -> Expr;

    fn expand(&self, expr: &Expr) -> Expr;

    fn differentiate(&self, expr: &Expr, var: &Symbol) -> Result<Expr, BackendError>;

    fn integrate(&self, expr: &Expr, var: &Symbol, lower: &Expr, upper: &Expr) -> Result<Expr, BackendError>;

    fn sum(&self, expr: &Expr, var: &Symbol, lower: &Expr, upper: &Expr) -> Result<Expr, BackendError>;

    /// Every root of `lhs = rhs` in `var` the backend can express.
    fn solve(&self, lhs: &Expr, rhs: &Expr, var: &Symbol) -> Result<Vec<Expr>, BackendError>;

    fn limit(&self, expr: &Expr, var: &Symbol, point: &Expr) -> Result<Expr, BackendError>;

    fn equal(&self, a: &Expr, b: &Expr) -> bool;
}

// ─────────────────────────────────────────────
// NativeBackend
// ─────────────────────────────────────────────

const PROBE_POINTS: [f64; 3] = [0.37, 1.29, 2.71];
const PROBE_TOLERANCE: f64 = 1e-9;

/// In-process backend over [`Expr`].
#[derive(Clone, Debug)]
pub struct NativeBackend {
    budget: Duration,
}

impl NativeBackend {
    pub fn new(budget: Duration) -> NativeBackend {
        NativeBackend { budget }
    }

    fn deadline(&self, operation: &'static str) -> Deadline {
        Deadline::new(operation, self.budget)
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        NativeBackend::new(Duration::from_millis(10_000))
    }
}

impl SymbolicBackend for NativeBackend {
    fn simplify(&self, expr: &Expr) -> Expr {
        expand(expr)
    }

    fn expand(&self, expr: &Expr) -> Expr {
        expand(expr)
    }

    fn differentiate(&self, expr: &Expr, var: &Symbol) -> Result<Expr, BackendError> {
        self.deadline("differentiate").check()?;
        Ok(expand(&differentiate(expr, var)))
    }

    fn integrate(&self, expr: &Expr, var: &Symbol, lower: &Expr, upper: &Expr) -> Result<Expr, BackendError> {
        definite_integral(expr, var, lower, upper, &self.deadline("integrate"))
    }

    fn sum(&self, expr: &Expr, var: &Symbol, lower: &Expr, upper: &Expr) -> Result<Expr, BackendError> {
        sum(expr, var, lower, upper, &self.deadline("sum"))
    }

    fn solve(&self, lhs: &Expr, rhs: &Expr, var: &Symbol) -> Result<Vec<Expr>, BackendError> {
        solve(lhs, rhs, var, &self.deadline("solve"))
    }

    fn limit(&self, expr: &Expr, var: &Symbol, point: &Expr) -> Result<Expr, BackendError> {
        limit(expr, var, point, &self.deadline("limit"))
    }

    fn equal(&self, a: &Expr, b: &Expr) -> bool {
        if a == b || expand(&(a.clone() - b.clone())).is_zero() {
            return true;
        }
        let symbols: Vec<Symbol> = a.free_symbols().union(&b.free_symbols()).cloned().collect();
        (0..PROBE_POINTS.len()).all(|offset| {
            let env: HashMap<Symbol, f64> = symbols
                .iter()
                .enumerate()
                .map(|(i, s)| (s.clone(), PROBE_POINTS[(i + offset) % PROBE_POINTS.len()]))
                .collect();
            match (a.eval(&env), b.eval(&env)) {
                (Some(x), Some(y)) if x.is_nan() && y.is_nan() => true,
                (Some(x), Some(y)) if x == y => true,
                (Some(x), Some(y)) => (x - y).abs() <= PROBE_TOLERANCE * x.abs().max(y.abs()).max(1.0),
                _ => false,
            }
        })
    }
}
