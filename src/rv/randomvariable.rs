use std::fmt;
use std::str::FromStr;
use std::sync::{
    Arc,
    OnceLock
};

use serde::{
    Deserialize,
    Serialize
};

use crate::rv::engineerror::EngineError;
use crate::symbolic::expr::{
    Expr,
    Symbol
};
use crate::symbolic::parser::parse;

/// Default free variable of the pieces.
pub const DEFAULT_VARIABLE: &str = "x";

fn normalized(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

// ─────────────────────────────────────────────
// Nature / Form
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nature {
    Continuous,
    /// Piecewise expressions over the integers of each segment.
    DiscreteFunctional,
    /// An enumerated table: one breakpoint per support value.
    DiscreteExplicit,
}

impl Nature {
    pub fn is_discrete(&self) -> bool {
        !matches!(self, Nature::Continuous)
    }
}

impl FromStr for Nature {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalized(s).as_str() {
            "continuous" => Ok(Nature::Continuous),
            "discretefunctional" | "functional" => Ok(Nature::DiscreteFunctional),
            "discreteexplicit" | "explicit" | "discrete" => Ok(Nature::DiscreteExplicit),
            _ => Err(EngineError::Kind(s.to_owned())),
        }
    }
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Nature::Continuous => "continuous",
            Nature::DiscreteFunctional => "discrete-functional",
            Nature::DiscreteExplicit => "discrete-explicit",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    Pdf,
    Cdf,
    Sf,
    Hf,
    Chf,
    Idf,
}

impl Form {
    pub const ALL: [Form; 6] = [Form::Pdf, Form::Cdf, Form::Sf, Form::Hf, Form::Chf, Form::Idf];

    fn slot(&self) -> usize {
        match self {
            Form::Pdf => 0,
            Form::Cdf => 1,
            Form::Sf => 2,
            Form::Hf => 3,
            Form::Chf => 4,
            Form::Idf => 5,
        }
    }
}

impl FromStr for Form {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalized(s).as_str() {
            "pdf" | "density" => Ok(Form::Pdf),
            "cdf" => Ok(Form::Cdf),
            "sf" | "survivor" => Ok(Form::Sf),
            "hf" | "hazard" => Ok(Form::Hf),
            "chf" | "cumulativehazard" => Ok(Form::Chf),
            "idf" | "inverse" => Ok(Form::Idf),
            _ => Err(EngineError::Kind(s.to_owned())),
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Form::Pdf => "PDF",
            Form::Cdf => "CDF",
            Form::Sf => "SF",
            Form::Hf => "HF",
            Form::Chf => "CHF",
            Form::Idf => "IDF",
        };
        write!(f, "{name}")
    }
}

// ─────────────────────────────────────────────
// Form cache
// ─────────────────────────────────────────────

/// Write-once memo of the other forms of one random variable.
#[derive(Default)]
pub(crate) struct FormCache {
    slots: [OnceLock<Arc<RandomVariable>>; 6],
}

impl FormCache {
    pub(crate) fn get(&self, form: Form) -> Option<Arc<RandomVariable>> {
        self.slots[form.slot()].get().cloned()
    }

    pub(crate) fn store(&self, form: Form, rv: Arc<RandomVariable>) -> Arc<RandomVariable> {
        self.slots[form.slot()].get_or_init(|| rv).clone()
    }
}

impl Clone for FormCache {
    fn clone(&self) -> Self {
        let cache = FormCache::default();
        for (slot, source) in cache.slots.iter().zip(self.slots.iter()) {
            if let Some(rv) = source.get() {
                let _ = slot.set(rv.clone());
            }
        }
        cache
    }
}

impl fmt::Debug for FormCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filled: Vec<Form> = Form::ALL.into_iter().filter(|form| self.slots[form.slot()].get().is_some()).collect();
        f.debug_struct("FormCache").field("filled", &filled).finish()
    }
}

// ─────────────────────────────────────────────
// RandomVariable
// ─────────────────────────────────────────────

/// A piecewise random variable.
///
/// For continuous and discrete-functional variables piece `i` is defined on
/// `[breakpoints[i], breakpoints[i + 1]]`; a discrete-functional piece owns the
/// integers `b_i <= k < b_{i+1}` and the last piece also owns its right end.
/// A discrete-explicit variable has one breakpoint per support value and its
/// pieces are the tabulated values of the form.
#[derive(Clone, Debug)]
pub struct RandomVariable {
    pieces: Vec<Expr>,
    breakpoints: Vec<Expr>,
    nature: Nature,
    form: Form,
    var: Symbol,
    pub(crate) cache: FormCache,
}

impl PartialEq for RandomVariable {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
            && self.breakpoints == other.breakpoints
            && self.nature == other.nature
            && self.form == other.form
            && self.var == other.var
    }
}

impl RandomVariable {
    pub fn new(pieces: Vec<Expr>, breakpoints: Vec<Expr>, nature: Nature, form: Form) -> Result<RandomVariable, EngineError> {
        RandomVariable::with_variable(pieces, breakpoints, nature, form, Symbol::new(DEFAULT_VARIABLE))
    }

    pub fn with_variable(
        pieces: Vec<Expr>,
        breakpoints: Vec<Expr>,
        nature: Nature,
        form: Form,
        var: Symbol,
    ) -> Result<RandomVariable, EngineError> {
        let expected = match nature {
            Nature::DiscreteExplicit => pieces.len(),
            _ => pieces.len() + 1,
        };
        if pieces.is_empty() {
            return Err(EngineError::Shape("a random variable needs at least one piece".to_owned()));
        }
        if breakpoints.len() != expected {
            return Err(EngineError::Shape(format!(
                "{nature} {form} with {} pieces needs {expected} breakpoints, got {}",
                pieces.len(),
                breakpoints.len()
            )));
        }
        for (i, pair) in breakpoints.windows(2).enumerate() {
            if let (Some(a), Some(b)) = (pair[0].to_f64(), pair[1].to_f64()) {
                if !(a < b) {
                    return Err(EngineError::Order(format!(
                        "breakpoint {} ({}) is not below breakpoint {} ({})",
                        i,
                        pair[0],
                        i + 1,
                        pair[1]
                    )));
                }
            }
        }
        Ok(RandomVariable {
            pieces,
            breakpoints,
            nature,
            form,
            var,
            cache: FormCache::default(),
        })
    }

    pub fn continuous_pdf(pieces: Vec<Expr>, breakpoints: Vec<Expr>) -> Result<RandomVariable, EngineError> {
        RandomVariable::new(pieces, breakpoints, Nature::Continuous, Form::Pdf)
    }

    pub fn discrete_functional_pdf(pieces: Vec<Expr>, breakpoints: Vec<Expr>) -> Result<RandomVariable, EngineError> {
        RandomVariable::new(pieces, breakpoints, Nature::DiscreteFunctional, Form::Pdf)
    }

    /// Enumerated PDF with `masses[i] = P(X = support[i])`.
    pub fn discrete_explicit_pdf(masses: Vec<f64>, support: Vec<f64>) -> Result<RandomVariable, EngineError> {
        RandomVariable::new(
            masses.into_iter().map(Expr::num).collect(),
            support.into_iter().map(Expr::num).collect(),
            Nature::DiscreteExplicit,
            Form::Pdf,
        )
    }

    /// Builds a random variable from infix text, e.g.
    /// `from_strings(&["2*exp(-2*x)"], &["0", "inf"], Nature::Continuous, Form::Pdf, "x")`.
    pub fn from_strings(
        pieces: &[&str],
        breakpoints: &[&str],
        nature: Nature,
        form: Form,
        var: &str,
    ) -> Result<RandomVariable, EngineError> {
        let pieces = pieces.iter().map(|p| parse(p)).collect::<Result<Vec<_>, _>>()?;
        let breakpoints = breakpoints.iter().map(|b| parse(b)).collect::<Result<Vec<_>, _>>()?;
        RandomVariable::with_variable(pieces, breakpoints, nature, form, Symbol::new(var))
    }

    /// Same nature and variable, new pieces and breakpoints.
    pub(crate) fn derive(&self, pieces: Vec<Expr>, breakpoints: Vec<Expr>, form: Form) -> Result<RandomVariable, EngineError> {
        RandomVariable::with_variable(pieces, breakpoints, self.nature, form, self.var.clone())
    }

    pub fn pieces(&self) -> &[Expr] {
        &self.pieces
    }

    pub fn breakpoints(&self) -> &[Expr] {
        &self.breakpoints
    }

    pub fn nature(&self) -> Nature {
        self.nature
    }

    pub fn form(&self) -> Form {
        self.form
    }

    pub fn var(&self) -> &Symbol {
        &self.var
    }

    pub fn lower(&self) -> &Expr {
        &self.breakpoints[0]
    }

    pub fn upper(&self) -> &Expr {
        &self.breakpoints[self.breakpoints.len() - 1]
    }

    pub fn numeric_breakpoints(&self, operation: &'static str) -> Result<Vec<f64>, EngineError> {
        self.breakpoints
            .iter()
            .map(|b| {
                b.to_f64()
                    .ok_or_else(|| EngineError::unsupported(operation, format!("symbolic breakpoint {b}")))
            })
            .collect()
    }

    /// Tabulated values of a discrete-explicit variable.
    pub fn numeric_pieces(&self, operation: &'static str) -> Result<Vec<f64>, EngineError> {
        self.pieces
            .iter()
            .map(|p| {
                p.to_f64()
                    .ok_or_else(|| EngineError::unsupported(operation, format!("symbolic value {p}")))
            })
            .collect()
    }

    /// `[lower, upper]` as numbers.
    pub fn support(&self, operation: &'static str) -> Result<(f64, f64), EngineError> {
        let lower = self
            .lower()
            .to_f64()
            .ok_or_else(|| EngineError::unsupported(operation, format!("symbolic support bound {}", self.lower())))?;
        let upper = self
            .upper()
            .to_f64()
            .ok_or_else(|| EngineError::unsupported(operation, format!("symbolic support bound {}", self.upper())))?;
        Ok((lower, upper))
    }

    pub fn is_bounded(&self) -> bool {
        self.support("bounds").is_ok_and(|(lo, hi)| lo.is_finite() && hi.is_finite())
    }

    /// Index of the piece owning `x`; the right end belongs to the last piece.
    pub(crate) fn piece_index(breakpoints: &[f64], x: f64) -> Option<usize> {
        let pieces = breakpoints.len().checked_sub(1)?;
        if pieces == 0 || x < breakpoints[0] || x > breakpoints[pieces] {
            return None;
        }
        let i = breakpoints.partition_point(|b| *b <= x);
        Some(i.saturating_sub(1).min(pieces - 1))
    }

    /// The same variable with its pieces written in `to`.
    pub fn rename_variable(&self, to: &Symbol) -> RandomVariable {
        if *to == self.var {
            return self.clone();
        }
        let with = Expr::sym(to);
        RandomVariable {
            pieces: self.pieces.iter().map(|p| p.subs(&self.var, &with)).collect(),
            breakpoints: self.breakpoints.clone(),
            nature: self.nature,
            form: self.form,
            var: to.clone(),
            cache: FormCache::default(),
        }
    }
}

impl fmt::Display for RandomVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} in {}", self.nature, self.form, self.var)?;
        match self.nature {
            Nature::DiscreteExplicit => {
                for (value, point) in self.pieces.iter().zip(self.breakpoints.iter()) {
                    writeln!(f, "  {point}: {value}")?;
                }
            }
            _ => {
                for (i, piece) in self.pieces.iter().enumerate() {
                    writeln!(f, "  [{}, {}]: {piece}", self.breakpoints[i], self.breakpoints[i + 1])?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error() {
        let r = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::zero()]);
        assert!(matches!(r, Err(EngineError::Shape(_))));
    }

    #[test]
    fn test_order_error() {
        let r = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::one(), Expr::zero()]);
        assert!(matches!(r, Err(EngineError::Order(_))));
    }

    #[test]
    fn test_symbolic_breakpoints_are_exempt_from_order() {
        let r = RandomVariable::continuous_pdf(vec![Expr::one()], vec![Expr::symbol("a"), Expr::symbol("b")]);
        assert!(r.is_ok());
    }

    #[test]
    fn test_kind_error() {
        assert!(matches!("gaussian".parse::<Nature>(), Err(EngineError::Kind(_))));
        assert_eq!("Discrete_Explicit".parse::<Nature>().unwrap(), Nature::DiscreteExplicit);
        assert_eq!("cdf".parse::<Form>().unwrap(), Form::Cdf);
    }

    #[test]
    fn test_piece_index_owns_right_end() {
        let b = [0.0, 1.0, 2.0];
        assert_eq!(RandomVariable::piece_index(&b, 0.0), Some(0));
        assert_eq!(RandomVariable::piece_index(&b, 1.0), Some(1));
        assert_eq!(RandomVariable::piece_index(&b, 2.0), Some(1));
        assert_eq!(RandomVariable::piece_index(&b, 2.5), None);
    }

    #[test]
    fn test_from_strings() {
        let rv = RandomVariable::from_strings(&["2*exp(-2*t)"], &["0", "inf"], Nature::Continuous, Form::Pdf, "t").unwrap();
        assert_eq!(rv.var().name(), "t");
        assert_eq!(rv.upper(), &Expr::infinity());
        assert!(!rv.is_bounded());
    }

    #[test]
    fn test_rename_variable() {
        let rv = RandomVariable::continuous_pdf(vec![Expr::symbol("x")], vec![Expr::zero(), Expr::one()]).unwrap();
        let renamed = rv.rename_variable(&Symbol::new("y"));
        assert_eq!(renamed.pieces()[0], Expr::symbol("y"));
    }
}
