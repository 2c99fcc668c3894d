use std::collections::BTreeSet;

use tracing::debug;

use crate::math::round::{
    approx_eq,
    snap
};
use crate::rv::engine::Engine;
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
use crate::symbolic::parser::parse;

/// A piecewise function `g`, piece `i` applying on `[breakpoints[i], breakpoints[i + 1]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Mapping {
    pieces: Vec<Expr>,
    breakpoints: Vec<Expr>,
    var: Symbol,
}

impl Mapping {
    pub fn new(pieces: Vec<Expr>, breakpoints: Vec<Expr>, var: Symbol) -> Result<Mapping, EngineError> {
        if pieces.is_empty() || breakpoints.len() != pieces.len() + 1 {
            return Err(EngineError::InvalidTransform(format!(
                "{} pieces need {} breakpoints, got {}",
                pieces.len(),
                pieces.len() + 1,
                breakpoints.len()
            )));
        }
        for pair in breakpoints.windows(2) {
            match (pair[0].to_f64(), pair[1].to_f64()) {
                (Some(a), Some(b)) if a < b => {}
                _ => {
                    return Err(EngineError::InvalidTransform(format!(
                        "breakpoints {} and {} are not numeric and ascending",
                        pair[0], pair[1]
                    )));
                }
            }
        }
        Ok(Mapping {
            pieces,
            breakpoints,
            var,
        })
    }

    /// `g` applied on the whole real line.
    pub fn single(g: Expr, var: Symbol) -> Mapping {
        Mapping {
            pieces: vec![g],
            breakpoints: vec![Expr::neg_infinity(), Expr::infinity()],
            var,
        }
    }

    pub fn parse(pieces: &[&str], breakpoints: &[&str], var: &str) -> Result<Mapping, EngineError> {
        let pieces = pieces.iter().map(|p| parse(p)).collect::<Result<Vec<_>, _>>()?;
        let breakpoints = breakpoints.iter().map(|b| parse(b)).collect::<Result<Vec<_>, _>>()?;
        Mapping::new(pieces, breakpoints, Symbol::new(var))
    }

    pub fn pieces(&self) -> &[Expr] {
        &self.pieces
    }

    pub fn breakpoints(&self) -> &[Expr] {
        &self.breakpoints
    }

    pub fn var(&self) -> &Symbol {
        &self.var
    }

    fn numeric_breakpoints(&self) -> Vec<f64> {
        // validated in `new`; `single` uses ±inf
        self.breakpoints.iter().filter_map(Expr::to_f64).collect()
    }

    fn domain(&self) -> (f64, f64) {
        let breakpoints = self.numeric_breakpoints();
        match (breakpoints.first(), breakpoints.last()) {
            (Some(lower), Some(upper)) => (*lower, *upper),
            _ => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    /// The piece covering `x`, written in `var`; `None` outside the domain.
    fn piece_at(&self, x: f64, var: &Symbol) -> Option<Expr> {
        let breakpoints = self.numeric_breakpoints();
        let i = RandomVariable::piece_index(&breakpoints, x)?;
        Some(self.pieces[i].subs(&self.var, &Expr::sym(var)))
    }
}

impl Engine {
    /// Density of `g(X)`.
    pub fn transform(&self, rv: &RandomVariable, mapping: &Mapping) -> Result<RandomVariable, EngineError> {
        let pdf = self.form_of(rv, Form::Pdf)?;
        match pdf.nature() {
            Nature::Continuous => self.transform_continuous(&pdf, mapping),
            Nature::DiscreteExplicit => self.transform_explicit(&pdf, mapping),
            Nature::DiscreteFunctional => {
                if !pdf.is_bounded() {
                    return Err(EngineError::unsupported(
                        "transform",
                        "a discrete-functional variable with unbounded support",
                    ));
                }
                let explicit = self.convert(&pdf, 1.0)?;
                self.transform_explicit(&explicit, mapping)
            }
        }
    }

    fn transform_continuous(&self, pdf: &RandomVariable, mapping: &Mapping) -> Result<RandomVariable, EngineError> {
        let support = pdf.numeric_breakpoints("transform")?;
        let var = pdf.var();
        let tolerance = self.config().tolerance;
        let (domain_lower, domain_upper) = mapping.domain();
        let lower = support[0].max(domain_lower);
        let upper = support[support.len() - 1].min(domain_upper);
        if !(lower < upper) || approx_eq(lower, upper, tolerance) {
            return Err(EngineError::InvalidTransform(format!(
                "the mapping domain [{domain_lower}, {domain_upper}] does not meet the support [{}, {}]",
                support[0],
                support[support.len() - 1]
            )));
        }
        if lower > support[0] || upper < support[support.len() - 1] {
            debug!(lower, upper, "support clipped to the mapping domain");
        }
        let inside = support
            .iter()
            .copied()
            .chain(mapping.numeric_breakpoints())
            .filter(|b| {
                if b.is_finite() && (*b < lower || *b > upper) {
                    debug!(breakpoint = *b, "breakpoint outside the clipped support is dropped");
                }
                *b > lower && *b < upper
            })
            .collect::<Vec<f64>>();
        let cuts = merge_breakpoints([lower, upper].into_iter().chain(inside), tolerance);

        let mut taken: BTreeSet<Symbol> = BTreeSet::new();
        taken.insert(var.clone());
        for e in pdf.pieces().iter().chain(mapping.pieces()) {
            taken.extend(e.free_symbols());
        }
        let y = Symbol::fresh("y", &taken);

        let mut contributions: Vec<(f64, f64, Expr)> = Vec::new();
        let mut images: Vec<f64> = Vec::new();
        for (segment, pair) in cuts.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let test = interior_point(a, b);
            let f = RandomVariable::piece_index(&support, test)
                .map(|i| &pdf.pieces()[i])
                .ok_or_else(|| EngineError::InvalidTransform(format!("segment {segment} lies outside the support")))?;
            let g = mapping
                .piece_at(test, var)
                .ok_or_else(|| EngineError::InvalidTransform(format!("the mapping is not defined at {test}")))?;
            let ga = self.bound_value("transform", segment, &g, var, a)?;
            let gb = self.bound_value("transform", segment, &g, var, b)?;
            if approx_eq(ga, gb, tolerance) {
                return Err(EngineError::InvalidTransform(format!(
                    "the mapping is constant on segment {segment} [{a}, {b}]"
                )));
            }
            let increasing = gb > ga;
            let candidates = self.solve("transform", Some(segment), &g, &Expr::sym(&y), var)?;
            let inverse = self.select_inverse("transform", segment, &g, var, candidates, &y, test)?;
            let jacobian = self.differentiate("transform", Some(segment), &inverse, &y)?;
            let orientation = Expr::num(if increasing { 1.0 } else { -1.0 });
            let density = self.simplify(&Expr::Mul(vec![orientation, f.subs(var, &inverse), jacobian]));
            debug!(segment, a, b, ga, gb, increasing, "transform segment");
            let (lo, hi) = if increasing { (ga, gb) } else { (gb, ga) };
            images.push(lo);
            images.push(hi);
            contributions.push((lo, hi, density));
        }

        let mut accumulator = PiecewiseAccumulator::new(merge_breakpoints(images, tolerance), tolerance);
        for (lo, hi, density) in contributions {
            accumulator.add(lo, hi, density);
        }
        let (pieces, breakpoints) = accumulator.finish(self);
        let pieces = pieces
            .iter()
            .map(|p| self.simplify(&p.subs(&y, &Expr::sym(var))))
            .collect();
        RandomVariable::with_variable(pieces, breakpoints, Nature::Continuous, Form::Pdf, var.clone())
    }

    fn transform_explicit(&self, pdf: &RandomVariable, mapping: &Mapping) -> Result<RandomVariable, EngineError> {
        let (masses, support) = self.explicit_masses(pdf);
        let var = pdf.var();
        let mut mapped: Vec<(f64, Expr)> = Vec::with_capacity(masses.len());
        for (i, (mass, point)) in masses.into_iter().zip(support).enumerate() {
            let s = point
                .to_f64()
                .ok_or_else(|| EngineError::unsupported("transform", format!("symbolic support value {point}")))?;
            let Some(g) = mapping.piece_at(s, var) else {
                debug!(point = s, "support value outside the mapping domain is dropped");
                continue;
            };
            mapped.push((self.value_at("transform", Some(i), &g, var, s)?, mass));
        }
        if mapped.is_empty() {
            let (lower, upper) = mapping.domain();
            return Err(EngineError::InvalidTransform(format!(
                "no support value lies in the mapping domain [{lower}, {upper}]"
            )));
        }
        let (pieces, breakpoints) = self.merge_masses(mapped);
        RandomVariable::with_variable(pieces, breakpoints, Nature::DiscreteExplicit, Form::Pdf, var.clone())
    }

    /// Sorts `(value, mass)` pairs by value and adds the masses of equal values.
    pub(crate) fn merge_masses(&self, mut pairs: Vec<(f64, Expr)>) -> (Vec<Expr>, Vec<Expr>) {
        let tolerance = self.config().tolerance;
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut values: Vec<f64> = Vec::new();
        let mut masses: Vec<Expr> = Vec::new();
        for (value, mass) in pairs {
            match (values.last(), masses.last_mut()) {
                (Some(last), Some(total)) if approx_eq(*last, value, tolerance) => {
                    *total = self.tidy(&(total.clone() + mass));
                }
                _ => {
                    values.push(snap(value));
                    masses.push(self.tidy(&mass));
                }
            }
        }
        (masses, values.into_iter().map(Expr::num).collect())
    }

    /// `X` conditioned on `lo <= X <= hi`.
    pub fn truncate(&self, rv: &RandomVariable, lo: f64, hi: f64) -> Result<RandomVariable, EngineError> {
        if !(lo < hi) {
            return Err(EngineError::InvalidArgument(format!("truncation needs lo < hi, got [{lo}, {hi}]")));
        }
        let pdf = self.form_of(rv, Form::Pdf)?;
        let empty = |lower: f64, upper: f64| EngineError::OutOfSupport {
            operation: "truncate",
            point: format!("[{lo}, {hi}]"),
            lower: lower.to_string(),
            upper: upper.to_string(),
        };
        match pdf.nature() {
            Nature::DiscreteExplicit => {
                let (masses, support) = self.explicit_masses(&pdf);
                let mut kept: Vec<(f64, Expr)> = Vec::new();
                for (mass, point) in masses.into_iter().zip(support) {
                    let s = point
                        .to_f64()
                        .ok_or_else(|| EngineError::unsupported("truncate", format!("symbolic support value {point}")))?;
                    if s >= lo && s <= hi {
                        kept.push((s, mass));
                    }
                }
                let (lower, upper) = pdf.support("truncate")?;
                if kept.is_empty() {
                    return Err(empty(lower, upper));
                }
                let total = self.tidy(&Expr::Add(kept.iter().map(|(_, m)| m.clone()).collect()));
                if total.is_zero() {
                    return Err(empty(lower, upper));
                }
                let pieces = kept.iter().map(|(_, m)| self.tidy(&(m.clone() / total.clone()))).collect();
                let breakpoints = kept.iter().map(|(s, _)| Expr::num(*s)).collect();
                pdf.derive(pieces, breakpoints, Form::Pdf)
            }
            nature => {
                let support = pdf.numeric_breakpoints("truncate")?;
                let (lower, upper) = (support[0], support[support.len() - 1]);
                let (l, h) = match nature {
                    Nature::DiscreteFunctional => (lo.max(lower).ceil(), hi.min(upper).floor()),
                    _ => (lo.max(lower), hi.min(upper)),
                };
                if l > h || (nature == Nature::Continuous && l == h) {
                    return Err(empty(lower, upper));
                }
                let below = if nature == Nature::DiscreteFunctional {
                    if l > lower { self.cdf_at(&pdf, l - 1.0)? } else { 0.0 }
                } else {
                    self.cdf_at(&pdf, l)?
                };
                let mass = self.cdf_at(&pdf, h)? - below;
                if !(mass > 0.0) {
                    return Err(empty(lower, upper));
                }
                let mut cuts = vec![l];
                cuts.extend(support.iter().copied().filter(|b| *b > l && *b < h));
                cuts.push(h);
                let mut pieces = Vec::with_capacity(cuts.len() - 1);
                for pair in cuts.windows(2) {
                    let probe = if nature == Nature::DiscreteFunctional { pair[0] } else { interior_point(pair[0], pair[1]) };
                    let i = RandomVariable::piece_index(&support, probe).unwrap_or(0);
                    pieces.push(self.simplify(&(pdf.pieces()[i].clone() / Expr::num(mass))));
                }
                if nature == Nature::DiscreteFunctional && cuts.len() == 2 && l == h {
                    // a single integer: one piece on [l, l]
                    return pdf.derive(pieces, vec![Expr::num(l), Expr::num(l + 1.0)], Form::Pdf);
                }
                pdf.derive(pieces, cuts.into_iter().map(Expr::num).collect(), Form::Pdf)
            }
        }
    }
}
