//! Bookkeeping shared by the operations that re-partition a support:
//! breakpoint unions, per-interval accumulation of contributions, test
//! points, and the choice of one inverse among the solver's candidates.

use std::collections::HashMap;

use tracing::debug;

use crate::math::round::{
    approx_eq,
    snap
};
use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::symbolic::backend::BackendError;
use crate::symbolic::expr::{
    Expr,
    Symbol
};

/// Relative agreement required of `inverse(forward(t))` and `t`.
const INVERSE_CHECK_TOLERANCE: f64 = 1e-7;

/// Values given to free parameters when probing candidate expressions.
const PARAMETER_PROBES: [f64; 4] = [1.3, 1.7, 2.3, 2.9];

/// Sorted union of `values` with near-duplicates collapsed.
pub(crate) fn merge_breakpoints(values: impl IntoIterator<Item = f64>, tolerance: f64) -> Vec<f64> {
    let mut merged: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).map(snap).collect();
    merged.sort_by(f64::total_cmp);
    merged.dedup_by(|a, b| approx_eq(*a, *b, tolerance));
    merged
}

/// A point strictly inside `(lower, upper)`.
pub(crate) fn interior_point(lower: f64, upper: f64) -> f64 {
    match (lower.is_finite(), upper.is_finite()) {
        (true, true) => 0.5 * (lower + upper),
        (true, false) => lower + 1.0,
        (false, true) => upper - 1.0,
        (false, false) => 0.0,
    }
}

/// Numeric stand-ins for every free symbol of `exprs` except `skip`.
pub(crate) fn probe_environment<'a>(exprs: impl IntoIterator<Item = &'a Expr>, skip: &[&Symbol]) -> HashMap<Symbol, f64> {
    let mut env = HashMap::new();
    let mut next = 0;
    for expr in exprs {
        for symbol in expr.free_symbols() {
            if skip.contains(&&symbol) || env.contains_key(&symbol) {
                continue;
            }
            env.insert(symbol, PARAMETER_PROBES[next % PARAMETER_PROBES.len()]);
            next += 1;
        }
    }
    env
}

fn eval_with(expr: &Expr, env: &HashMap<Symbol, f64>, var: &Symbol, value: f64) -> Option<f64> {
    let mut env = env.clone();
    env.insert(var.clone(), value);
    expr.eval(&env).filter(|v| v.is_finite())
}

/// Intervals of a refined partition, each collecting the expressions that
/// cover it.
pub(crate) struct PiecewiseAccumulator {
    breakpoints: Vec<f64>,
    contributions: Vec<Vec<Expr>>,
    tolerance: f64,
}

impl PiecewiseAccumulator {
    pub(crate) fn new(breakpoints: Vec<f64>, tolerance: f64) -> PiecewiseAccumulator {
        let intervals = breakpoints.len().saturating_sub(1);
        PiecewiseAccumulator {
            breakpoints,
            contributions: vec![Vec::new(); intervals],
            tolerance,
        }
    }

    /// Adds `expr` to every interval inside `[lower, upper]`.
    pub(crate) fn add(&mut self, lower: f64, upper: f64, expr: Expr) {
        let tolerance = self.tolerance;
        let below = |a: f64, b: f64| a <= b || approx_eq(a, b, tolerance);
        for (i, pair) in self.breakpoints.windows(2).enumerate() {
            if below(lower, pair[0]) && below(pair[1], upper) {
                self.contributions[i].push(expr.clone());
            }
        }
    }

    /// Summed pieces and breakpoints; adjacent identical pieces are merged.
    pub(crate) fn finish(self, engine: &Engine) -> (Vec<Expr>, Vec<Expr>) {
        let mut pieces: Vec<Expr> = Vec::with_capacity(self.contributions.len());
        let mut breakpoints: Vec<Expr> = vec![Expr::num(self.breakpoints[0])];
        for (i, terms) in self.contributions.into_iter().enumerate() {
            let piece = engine.simplify(&Expr::Add(terms));
            let right = Expr::num(self.breakpoints[i + 1]);
            if pieces.last() == Some(&piece) {
                debug!(interval = i, "merging identical adjacent pieces");
                if let Some(last) = breakpoints.last_mut() {
                    *last = right;
                }
                continue;
            }
            pieces.push(piece);
            breakpoints.push(right);
        }
        (pieces, breakpoints)
    }
}

impl Engine {
    /// Picks the candidate `c` of `forward(var) = target` with
    /// `c(forward(test_point)) = test_point`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn select_inverse(
        &self,
        operation: &'static str,
        segment: usize,
        forward: &Expr,
        var: &Symbol,
        candidates: Vec<Expr>,
        target: &Symbol,
        test_point: f64,
    ) -> Result<Expr, EngineError> {
        let env = probe_environment(std::iter::once(forward).chain(candidates.iter()), &[var, target]);
        let image = eval_with(forward, &env, var, test_point);
        let mut passing: Vec<Expr> = Vec::new();
        if let Some(image) = image {
            for candidate in candidates {
                let Some(back) = eval_with(&candidate, &env, target, image) else {
                    continue;
                };
                if !approx_eq(back, test_point, INVERSE_CHECK_TOLERANCE) {
                    continue;
                }
                if !passing.iter().any(|p| self.backend().equal(p, &candidate)) {
                    passing.push(candidate);
                }
            }
        }
        match passing.len() {
            0 => Err(EngineError::backend(
                operation,
                Some(segment),
                BackendError::Solve {
                    equation: format!("{forward} = {target}"),
                    var: var.to_string(),
                },
            )),
            1 => Ok(passing.remove(0)),
            count => Err(EngineError::AmbiguousInverse {
                operation,
                segment,
                count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_breakpoints() {
        let merged = merge_breakpoints([1.0, 0.0, 0.1 * 3.0, 0.3, f64::INFINITY], 1e-9);
        assert_eq!(merged, vec![0.0, 0.3, 1.0, f64::INFINITY]);
    }

    #[test]
    fn test_interior_point() {
        assert_eq!(interior_point(0.0, 2.0), 1.0);
        assert_eq!(interior_point(0.0, f64::INFINITY), 1.0);
        assert_eq!(interior_point(f64::NEG_INFINITY, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_accumulator_sums_overlaps() {
        let engine = Engine::default();
        let x = Expr::symbol("x");
        let mut acc = PiecewiseAccumulator::new(vec![0.0, 1.0, 2.0], 1e-9);
        acc.add(0.0, 2.0, x.clone());
        acc.add(1.0, 2.0, Expr::one());
        let (pieces, breakpoints) = acc.finish(&engine);
        assert_eq!(pieces.len(), 2);
        assert_eq!(breakpoints.len(), 3);
    }

    #[test]
    fn test_accumulator_merges_equal_neighbours() {
        let engine = Engine::default();
        let mut acc = PiecewiseAccumulator::new(vec![0.0, 1.0, 2.0], 1e-9);
        acc.add(0.0, 2.0, Expr::num(0.5));
        let (pieces, breakpoints) = acc.finish(&engine);
        assert_eq!(pieces, vec![Expr::num(0.5)]);
        assert_eq!(breakpoints, vec![Expr::zero(), Expr::num(2.0)]);
    }

    #[test]
    fn test_select_inverse_picks_the_branch_on_the_segment() {
        let engine = Engine::default();
        let xs = Symbol::new("x");
        let ys = Symbol::new("y");
        let forward = Expr::powf(Expr::sym(&xs), 2.0);
        let candidates = vec![Expr::sqrt(Expr::sym(&ys)), -Expr::sqrt(Expr::sym(&ys))];
        let chosen = engine
            .select_inverse("transform", 0, &forward, &xs, candidates.clone(), &ys, -0.5)
            .unwrap();
        assert_eq!(chosen, candidates[1]);
    }
}
