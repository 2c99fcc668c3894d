//! Density of a product of independent continuous variables.
//!
//! Every pair of operand pieces spans a rectangle `[a, b] x [c, d]`. Pieces
//! are split at zero and reflected so that each rectangle lies in the first
//! quadrant; there `V = XY` has density
//!
//! ```text
//! h(v) = ∫ f(x) g(v / x) / x dx,   max(a, v / d) < x < min(b, v / c)
//! ```
//!
//! and the two limits switch between constants and `v / .` at the corner
//! products `ad` and `bc`. The corner products of all rectangles form the
//! breakpoints of the result.

use tracing::debug;

use crate::rv::combination::combination::Operands;
use crate::rv::engine::{
    Engine,
    fresh_symbol
};
use crate::rv::engineerror::EngineError;
use crate::rv::partition::{
    PiecewiseAccumulator,
    interior_point,
    merge_breakpoints
};
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};

/// A piece restricted to one side of zero.
#[derive(Clone, Debug)]
struct Segment {
    lower: f64,
    upper: f64,
    density: Expr,
}

impl Segment {
    fn is_negative(&self) -> bool {
        self.upper <= 0.0
    }

    /// The segment of `-X`.
    fn reflect(&self, var: &Symbol) -> Segment {
        Segment {
            lower: negate(self.upper),
            upper: negate(self.lower),
            density: self.density.subs(var, &-Expr::sym(var)),
        }
    }
}

/// Integration limit in `x`: a constant, or `v / divisor`.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Limit {
    Fixed(f64),
    Ratio(f64),
}

impl Limit {
    fn value(self, v: f64) -> f64 {
        match self {
            Limit::Fixed(c) => c,
            Limit::Ratio(d) => v / d,
        }
    }

    fn expr(self, v: &Symbol) -> Expr {
        match self {
            Limit::Fixed(c) => Expr::num(c),
            Limit::Ratio(d) => Expr::sym(v) / Expr::num(d),
        }
    }
}

/// An interval of `v` and the `x`-limits that apply on it.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Strip {
    v_lower: f64,
    v_upper: f64,
    x_lower: Limit,
    x_upper: Limit,
}

/// `-v` without producing `-0.0`.
fn negate(v: f64) -> f64 {
    0.0 - v
}

/// `p * q` with `0 * inf = 0`.
fn corner(p: f64, q: f64) -> f64 {
    if p == 0.0 || q == 0.0 { 0.0 } else { p * q }
}

fn split_at_zero(pdf: &RandomVariable) -> Result<Vec<Segment>, EngineError> {
    let breakpoints = pdf.numeric_breakpoints("product")?;
    let mut segments = Vec::with_capacity(breakpoints.len());
    for (density, pair) in pdf.pieces().iter().zip(breakpoints.windows(2)) {
        let (a, b) = (pair[0], pair[1]);
        if a < 0.0 && b > 0.0 {
            segments.push(Segment { lower: a, upper: 0.0, density: density.clone() });
            segments.push(Segment { lower: 0.0, upper: b, density: density.clone() });
        } else {
            segments.push(Segment { lower: a, upper: b, density: density.clone() });
        }
    }
    Ok(segments)
}

/// Strips of the first-quadrant rectangle `[a, b] x [c, d]`, `0 <= a`, `0 <= c`.
fn quadrant_one_strips(a: f64, b: f64, c: f64, d: f64) -> Vec<Strip> {
    let corners = merge_breakpoints([corner(a, c), corner(a, d), corner(b, c), corner(b, d)], 0.0);
    let mut strips = Vec::with_capacity(3);
    for pair in corners.windows(2) {
        let v = interior_point(pair[0], pair[1]);
        let x_lower = if d.is_finite() && v / d > a { Limit::Ratio(d) } else { Limit::Fixed(a) };
        let x_upper = if c > 0.0 && v / c < b { Limit::Ratio(c) } else { Limit::Fixed(b) };
        if x_lower.value(v) < x_upper.value(v) {
            strips.push(Strip {
                v_lower: pair[0],
                v_upper: pair[1],
                x_lower,
                x_upper,
            });
        }
    }
    strips
}

impl Engine {
    /// Distribution of `X Y` for independent `X` and `Y`.
    pub fn product(&self, left: &RandomVariable, right: &RandomVariable) -> Result<RandomVariable, EngineError> {
        match self.operands("product", left, right)? {
            Operands::Discrete(x, y) => self.combine_tables(&x, &y, left.var(), |s, t| s * t),
            Operands::Continuous(f, g) => self.continuous_product(&f, &g),
        }
    }

    fn continuous_product(&self, f: &RandomVariable, g: &RandomVariable) -> Result<RandomVariable, EngineError> {
        let tolerance = self.config().tolerance;
        let x = fresh_symbol("t", &[f, g]);
        let v = fresh_symbol("v", &[f, g]);
        let left: Vec<Segment> = split_at_zero(f)?
            .into_iter()
            .map(|s| Segment { density: s.density.subs(f.var(), &Expr::sym(&x)), ..s })
            .collect();
        let right = split_at_zero(g)?;

        let mut contributions: Vec<(f64, f64, Expr)> = Vec::new();
        let mut segment = 0;
        for xs in &left {
            for ys in &right {
                let reflect_x = xs.is_negative();
                let reflect_y = ys.is_negative();
                let xs = if reflect_x { xs.reflect(&x) } else { xs.clone() };
                let ys = if reflect_y { ys.reflect(g.var()) } else { ys.clone() };
                let flip = reflect_x != reflect_y;
                let (a, b, c, d) = (xs.lower, xs.upper, ys.lower, ys.upper);
                let strips = quadrant_one_strips(a, b, c, d);
                debug!(
                    a, b, c, d,
                    ad_vs_bc = ?corner(a, d).partial_cmp(&corner(b, c)),
                    reflect_x, reflect_y,
                    strips = strips.len(),
                    "product rectangle"
                );
                let ratio = Expr::sym(&v) / Expr::sym(&x);
                let integrand = self.simplify(&(xs.density.clone() * ys.density.subs(g.var(), &ratio) / Expr::sym(&x)));
                for strip in strips {
                    let density = self.integrate(
                        "product",
                        Some(segment),
                        &integrand,
                        &x,
                        &strip.x_lower.expr(&v),
                        &strip.x_upper.expr(&v),
                    )?;
                    if flip {
                        let density = self.simplify(&density.subs(&v, &-Expr::sym(&v)));
                        contributions.push((negate(strip.v_upper), negate(strip.v_lower), density));
                    } else {
                        contributions.push((strip.v_lower, strip.v_upper, density));
                    }
                }
                segment += 1;
            }
        }

        let cuts = merge_breakpoints(contributions.iter().flat_map(|(lo, hi, _)| [*lo, *hi]), tolerance);
        let mut accumulator = PiecewiseAccumulator::new(cuts, tolerance);
        for (lo, hi, density) in contributions {
            accumulator.add(lo, hi, density);
        }
        let (pieces, breakpoints) = accumulator.finish(self);
        let var = f.var().clone();
        let pieces = pieces.iter().map(|p| self.simplify(&p.subs(&v, &Expr::sym(&var)))).collect();
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
    fn test_strips_when_ad_is_below_bc() {
        let strips = quadrant_one_strips(1.0, 4.0, 1.0, 2.0);
        assert_eq!(strips.len(), 3);
        assert_eq!((strips[0].x_lower, strips[0].x_upper), (Limit::Fixed(1.0), Limit::Ratio(1.0)));
        assert_eq!((strips[1].x_lower, strips[1].x_upper), (Limit::Ratio(2.0), Limit::Ratio(1.0)));
        assert_eq!((strips[2].x_lower, strips[2].x_upper), (Limit::Ratio(2.0), Limit::Fixed(4.0)));
    }

    #[test]
    fn test_strips_when_ad_is_above_bc() {
        let strips = quadrant_one_strips(1.0, 2.0, 1.0, 4.0);
        assert_eq!(strips.len(), 3);
        assert_eq!((strips[1].x_lower, strips[1].x_upper), (Limit::Fixed(1.0), Limit::Fixed(2.0)));
    }

    #[test]
    fn test_strips_touching_zero_and_infinity() {
        let strips = quadrant_one_strips(0.0, 1.0, 0.0, f64::INFINITY);
        assert_eq!(strips.len(), 1);
        assert_eq!((strips[0].v_lower, strips[0].v_upper), (0.0, f64::INFINITY));
        assert_eq!((strips[0].x_lower, strips[0].x_upper), (Limit::Fixed(0.0), Limit::Fixed(1.0)));
    }

    #[test]
    fn test_product_of_unit_uniforms() {
        let engine = Engine::default();
        let product = engine.product(&uniform(0.0, 1.0), &uniform(0.0, 1.0)).unwrap();
        // -ln v on (0, 1)
        assert!((engine.pdf_at(&product, 0.5).unwrap() - 2.0_f64.ln()).abs() < 1e-12);
        assert!((engine.cdf_at(&product, 1.0).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_product_across_zero() {
        let engine = Engine::default();
        let product = engine.product(&uniform(-1.0, 1.0), &uniform(0.0, 1.0)).unwrap();
        // -ln|v| / 2 on (-1, 1)
        assert!((engine.pdf_at(&product, -0.5).unwrap() - 0.5 * 2.0_f64.ln()).abs() < 1e-12);
        assert!((engine.pdf_at(&product, 0.5).unwrap() - 0.5 * 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_reflected_product_ends_at_positive_zero() {
        let engine = Engine::default();
        let product = engine.product(&uniform(-1.0, 0.0), &uniform(0.0, 1.0)).unwrap();
        let upper = product.breakpoints().last().and_then(Expr::to_f64).unwrap();
        assert_eq!(upper, 0.0);
        assert!(upper.is_sign_positive());
        assert_eq!(negate(0.0).to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn test_discrete_product() {
        let engine = Engine::default();
        let x = RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![-1.0, 2.0]).unwrap();
        let product = engine.product(&x, &x).unwrap();
        assert_eq!(product.breakpoints(), &[Expr::num(-2.0), Expr::num(1.0), Expr::num(4.0)]);
        assert_eq!(product.pieces(), &[Expr::num(0.5), Expr::num(0.25), Expr::num(0.25)]);
    }
}
