use std::cmp::Ordering;
use std::collections::{
    BTreeSet,
    HashMap
};
use std::fmt;
use std::ops;
use std::sync::Arc;

// ─────────────────────────────────────────────
// Symbol
// ─────────────────────────────────────────────

/// Name of a free variable or parameter.
///
/// Symbols are plain values; every operation that needs a scratch variable
/// derives one with [`Symbol::fresh`] instead of sharing a global table.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Symbol {
        Symbol(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns `base`, or `base_1`, `base_2`, ... whichever is not in `taken`.
    pub fn fresh(base: &str, taken: &BTreeSet<Symbol>) -> Symbol {
        let candidate = Symbol::new(base);
        if !taken.contains(&candidate) {
            return candidate;
        }
        (1..)
            .map(|i| Symbol::new(&format!("{base}_{i}")))
            .find(|s| !taken.contains(s))
            .unwrap_or(candidate)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────
// Expr
// ─────────────────────────────────────────────

/// Symbolic expression tree.
///
/// `Ln` is the log-magnitude `ln|u|`, which keeps `∫ 1/x dx = ln x` valid on
/// both half lines. Constructors below build raw nodes; canonical forms come
/// from [`crate::symbolic::simplify`].
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(f64),
    Sym(Symbol),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Exp(Box<Expr>),
    Ln(Box<Expr>),
}

impl Expr {
    pub fn num(value: f64) -> Expr {
        Expr::Num(value)
    }

    pub fn zero() -> Expr {
        Expr::Num(0.0)
    }

    pub fn one() -> Expr {
        Expr::Num(1.0)
    }

    pub fn infinity() -> Expr {
        Expr::Num(f64::INFINITY)
    }

    pub fn neg_infinity() -> Expr {
        Expr::Num(f64::NEG_INFINITY)
    }

    pub fn sym(symbol: &Symbol) -> Expr {
        Expr::Sym(symbol.clone())
    }

    pub fn symbol(name: &str) -> Expr {
        Expr::Sym(Symbol::new(name))
    }

    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        Expr::Pow(Box::new(base), Box::new(exponent))
    }

    pub fn powf(base: Expr, exponent: f64) -> Expr {
        Expr::pow(base, Expr::Num(exponent))
    }

    pub fn sqrt(arg: Expr) -> Expr {
        Expr::powf(arg, 0.5)
    }

    pub fn exp(arg: Expr) -> Expr {
        Expr::Exp(Box::new(arg))
    }

    pub fn ln(arg: Expr) -> Expr {
        Expr::Ln(Box::new(arg))
    }

    pub fn recip(arg: Expr) -> Expr {
        Expr::powf(arg, -1.0)
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(v) if *v == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Num(v) if *v == 1.0)
    }

    /// `Some(1)` for `+inf`, `Some(-1)` for `-inf`, `None` otherwise.
    pub fn infinite_sign(&self) -> Option<i8> {
        match self {
            Expr::Num(v) if *v == f64::INFINITY => Some(1),
            Expr::Num(v) if *v == f64::NEG_INFINITY => Some(-1),
            _ => None,
        }
    }

    /// Numeric value of a closed expression, `None` if a symbol is free.
    pub fn to_f64(&self) -> Option<f64> {
        self.eval(&HashMap::new())
    }

    pub fn eval_at(&self, var: &Symbol, value: f64) -> Option<f64> {
        let mut env = HashMap::with_capacity(1);
        env.insert(var.clone(), value);
        self.eval(&env)
    }

    pub fn eval(&self, env: &HashMap<Symbol, f64>) -> Option<f64> {
        match self {
            Expr::Num(v) => Some(*v),
            Expr::Sym(s) => env.get(s).copied(),
            Expr::Add(terms) => {
                let mut total = 0.0;
                for t in terms {
                    total += t.eval(env)?;
                }
                Some(total)
            }
            Expr::Mul(factors) => {
                let mut values = Vec::with_capacity(factors.len());
                for f in factors {
                    values.push(f.eval(env)?);
                }
                // 0 * inf is treated as 0: densities vanish faster than their
                // companions grow at the edges of a support.
                if values.iter().any(|v| *v == 0.0) {
                    Some(0.0)
                } else {
                    Some(values.iter().product())
                }
            }
            Expr::Pow(base, exponent) => {
                let b = base.eval(env)?;
                let e = exponent.eval(env)?;
                Some(b.powf(e))
            }
            Expr::Exp(arg) => Some(arg.eval(env)?.exp()),
            Expr::Ln(arg) => Some(arg.eval(env)?.abs().ln()),
        }
    }

    pub fn contains(&self, var: &Symbol) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Sym(s) => s == var,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.contains(var)),
            Expr::Pow(b, e) => b.contains(var) || e.contains(var),
            Expr::Exp(a) | Expr::Ln(a) => a.contains(var),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Num(_) => {}
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Add(items) | Expr::Mul(items) => {
                items.iter().for_each(|e| e.collect_symbols(out));
            }
            Expr::Pow(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Expr::Exp(a) | Expr::Ln(a) => a.collect_symbols(out),
        }
    }

    /// Replaces every occurrence of `var` by `with`. The result is not simplified.
    pub fn subs(&self, var: &Symbol, with: &Expr) -> Expr {
        match self {
            Expr::Num(_) => self.clone(),
            Expr::Sym(s) if s == var => with.clone(),
            Expr::Sym(_) => self.clone(),
            Expr::Add(terms) => Expr::Add(terms.iter().map(|t| t.subs(var, with)).collect()),
            Expr::Mul(factors) => Expr::Mul(factors.iter().map(|f| f.subs(var, with)).collect()),
            Expr::Pow(b, e) => Expr::pow(b.subs(var, with), e.subs(var, with)),
            Expr::Exp(a) => Expr::exp(a.subs(var, with)),
            Expr::Ln(a) => Expr::ln(a.subs(var, with)),
        }
    }

    /// True when a non-finite literal (or NaN) appears anywhere in the tree,
    /// or when the closed value is not finite.
    pub fn has_non_finite(&self) -> bool {
        let literal = match self {
            Expr::Num(v) => !v.is_finite(),
            Expr::Sym(_) => false,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.has_non_finite()),
            Expr::Pow(b, e) => b.has_non_finite() || e.has_non_finite(),
            Expr::Exp(a) | Expr::Ln(a) => a.has_non_finite(),
        };
        literal || self.to_f64().is_some_and(|v| !v.is_finite())
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::Num(_) => 0,
            Expr::Sym(_) => 1,
            Expr::Pow(..) => 2,
            Expr::Mul(_) => 3,
            Expr::Add(_) => 4,
            Expr::Exp(_) => 5,
            Expr::Ln(_) => 6,
        }
    }

    /// Total order used to sort the operands of sums and products.
    pub fn canonical_cmp(&self, other: &Expr) -> Ordering {
        match (self, other) {
            (Expr::Num(a), Expr::Num(b)) => a.total_cmp(b),
            (Expr::Sym(a), Expr::Sym(b)) => a.cmp(b),
            (Expr::Add(a), Expr::Add(b)) | (Expr::Mul(a), Expr::Mul(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.canonical_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Expr::Pow(b1, e1), Expr::Pow(b2, e2)) => {
                b1.canonical_cmp(b2).then_with(|| e1.canonical_cmp(e2))
            }
            (Expr::Exp(a), Expr::Exp(b)) | (Expr::Ln(a), Expr::Ln(b)) => a.canonical_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn is_atom(&self) -> bool {
        match self {
            Expr::Num(v) => *v >= 0.0 || v.is_nan(),
            Expr::Sym(_) | Expr::Exp(_) | Expr::Ln(_) => true,
            _ => false,
        }
    }

    /// Leading numeric factor, if negative, so that sums print as `a - b`.
    fn negated_display(&self) -> Option<Expr> {
        match self {
            Expr::Num(v) if *v < 0.0 => Some(Expr::Num(-v)),
            Expr::Mul(factors) => match factors.first() {
                Some(Expr::Num(c)) if *c < 0.0 => {
                    let mut rest = factors[1..].to_vec();
                    if *c != -1.0 {
                        rest.insert(0, Expr::Num(-c));
                    }
                    Some(if rest.len() == 1 { rest.remove(0) } else { Expr::Mul(rest) })
                }
                _ => None,
            },
            _ => None,
        }
    }
}

fn format_number(v: f64) -> String {
    if v == f64::INFINITY {
        "inf".to_owned()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_owned()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{}", format_number(*v)),
            Expr::Sym(s) => write!(f, "{s}"),
            Expr::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    match (i, term.negated_display()) {
                        (0, _) => write!(f, "{term}")?,
                        (_, Some(positive)) => write!(f, " - {positive}")?,
                        (_, None) => write!(f, " + {term}")?,
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    match factor {
                        Expr::Add(_) => write!(f, "({factor})")?,
                        Expr::Num(v) if *v == -1.0 && i == 0 && factors.len() > 1 => {
                            write!(f, "-1")?
                        }
                        _ => write!(f, "{factor}")?,
                    }
                }
                Ok(())
            }
            Expr::Pow(base, exponent) => {
                if base.is_atom() {
                    write!(f, "{base}")?;
                } else {
                    write!(f, "({base})")?;
                }
                if exponent.is_atom() {
                    write!(f, "^{exponent}")
                } else {
                    write!(f, "^({exponent})")
                }
            }
            Expr::Exp(arg) => write!(f, "exp({arg})"),
            Expr::Ln(arg) => write!(f, "ln({arg})"),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Expr {
        Expr::Num(value)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Expr {
        Expr::Sym(symbol.clone())
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, Expr::Mul(vec![Expr::Num(-1.0), rhs])])
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, rhs])
    }
}

impl ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, Expr::recip(rhs)])
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Mul(vec![Expr::Num(-1.0), self])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_log_magnitude() {
        let x = Symbol::new("x");
        let e = Expr::ln(Expr::sym(&x));
        assert!((e.eval_at(&x, -std::f64::consts::E).unwrap() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_zero_times_infinity_is_zero() {
        let e = Expr::Mul(vec![Expr::zero(), Expr::infinity()]);
        assert_eq!(e.to_f64(), Some(0.0));
    }

    #[test]
    fn test_fresh_symbol_skips_taken_names() {
        let taken: BTreeSet<Symbol> = [Symbol::new("v"), Symbol::new("v_1")].into_iter().collect();
        assert_eq!(Symbol::fresh("v", &taken).name(), "v_2");
    }

    #[test]
    fn test_subs_and_free_symbols() {
        let x = Symbol::new("x");
        let e = Expr::sym(&x) * Expr::symbol("theta");
        let s = e.subs(&x, &Expr::num(2.0));
        assert!(!s.contains(&x));
        assert_eq!(s.free_symbols().len(), 1);
    }

    #[test]
    fn test_display_sum_with_negative_term() {
        let x = Expr::symbol("x");
        let e = Expr::Add(vec![Expr::num(2.0), Expr::Mul(vec![Expr::num(-1.0), x])]);
        assert_eq!(e.to_string(), "2 - x");
    }
}
