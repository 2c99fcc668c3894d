use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::configuration::EngineConfig;
use crate::rv::engineerror::EngineError;
use crate::rv::randomvariable::RandomVariable;
use crate::symbolic::backend::{
    NativeBackend,
    SymbolicBackend
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};

/// Entry point of every operation on random variables.
///
/// The engine is stateless apart from its backend and configuration; all
/// operations take their operands by reference and return new values.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<dyn SymbolicBackend>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Engine {
        let backend = NativeBackend::new(Duration::from_millis(config.backend_timeout_ms));
        Engine {
            backend: Arc::new(backend),
            config,
        }
    }

    pub fn with_backend(backend: Arc<dyn SymbolicBackend>, config: EngineConfig) -> Engine {
        Engine { backend, config }
    }

    pub fn backend(&self) -> &dyn SymbolicBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────
    // Backend calls tagged with operation and segment
    // ─────────────────────────────────────────────

    pub(crate) fn simplify(&self, expr: &Expr) -> Expr {
        self.backend.simplify(expr)
    }

    pub(crate) fn integrate(
        &self,
        operation: &'static str,
        segment: Option<usize>,
        expr: &Expr,
        var: &Symbol,
        lower: &Expr,
        upper: &Expr,
    ) -> Result<Expr, EngineError> {
        self.backend
            .integrate(expr, var, lower, upper)
            .map_err(|e| EngineError::backend(operation, segment, e))
    }

    pub(crate) fn sum(
        &self,
        operation: &'static str,
        segment: Option<usize>,
        expr: &Expr,
        var: &Symbol,
        lower: &Expr,
        upper: &Expr,
    ) -> Result<Expr, EngineError> {
        self.backend
            .sum(expr, var, lower, upper)
            .map_err(|e| EngineError::backend(operation, segment, e))
    }

    pub(crate) fn differentiate(
        &self,
        operation: &'static str,
        segment: Option<usize>,
        expr: &Expr,
        var: &Symbol,
    ) -> Result<Expr, EngineError> {
        self.backend
            .differentiate(expr, var)
            .map_err(|e| EngineError::backend(operation, segment, e))
    }

    pub(crate) fn solve(
        &self,
        operation: &'static str,
        segment: Option<usize>,
        lhs: &Expr,
        rhs: &Expr,
        var: &Symbol,
    ) -> Result<Vec<Expr>, EngineError> {
        self.backend
            .solve(lhs, rhs, var)
            .map_err(|e| EngineError::backend(operation, segment, e))
    }

    pub(crate) fn limit(
        &self,
        operation: &'static str,
        segment: Option<usize>,
        expr: &Expr,
        var: &Symbol,
        point: &Expr,
    ) -> Result<Expr, EngineError> {
        self.backend
            .limit(expr, var, point)
            .map_err(|e| EngineError::backend(operation, segment, e))
    }

    /// Numeric value of `expr` at `x`, falling back to the limit where direct
    /// evaluation is undefined (e.g. `x ln x` at 0).
    pub(crate) fn value_at(
        &self,
        operation: &'static str,
        segment: Option<usize>,
        expr: &Expr,
        var: &Symbol,
        x: f64,
    ) -> Result<f64, EngineError> {
        if let Some(v) = expr.eval_at(var, x) {
            if v.is_finite() {
                return Ok(v);
            }
        }
        let value = self.limit(operation, segment, expr, var, &Expr::num(x))?;
        value.to_f64().ok_or_else(|| {
            EngineError::unsupported(operation, format!("`{expr}` has free parameters at {var} = {x}"))
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineConfig::default())
    }
}

/// A symbol not used by any of `rvs`, for scratch integration or summation.
pub(crate) fn fresh_symbol(base: &str, rvs: &[&RandomVariable]) -> Symbol {
    let mut taken = BTreeSet::new();
    for rv in rvs {
        taken.insert(rv.var().clone());
        for e in rv.pieces().iter().chain(rv.breakpoints()) {
            taken.extend(e.free_symbols());
        }
    }
    Symbol::fresh(base, &taken)
}
