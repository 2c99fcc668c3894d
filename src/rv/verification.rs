use crate::rv::engine::Engine;
use crate::rv::engineerror::EngineError;
use crate::rv::partition::interior_point;
use crate::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};
use crate::symbolic::expr::Expr;

/// Relative positions probed inside each finite piece.
const PROBES: [f64; 5] = [0.01, 0.25, 0.5, 0.75, 0.99];

/// Distances from the finite end probed on a half-infinite piece.
const TAIL_PROBES: [f64; 4] = [0.01, 1.0, 10.0, 100.0];

/// Integers probed per discrete-functional piece.
const INTEGER_PROBES: usize = 64;

/// Outcome of [`Engine::verify_pdf`].
#[derive(Clone, Debug, PartialEq)]
pub struct DensityCheck {
    /// Integral or sum of the density over its support.
    pub total_mass: f64,
    /// First probed point with a negative density, if any.
    pub negative_at: Option<f64>,
}

impl DensityCheck {
    pub fn is_valid(&self, tolerance: f64) -> bool {
        self.negative_at.is_none() && (self.total_mass - 1.0).abs() <= tolerance
    }
}

fn probe_points(lower: f64, upper: f64) -> Vec<f64> {
    match (lower.is_finite(), upper.is_finite()) {
        (true, true) => PROBES.iter().map(|p| lower + p * (upper - lower)).collect(),
        (true, false) => TAIL_PROBES.iter().map(|d| lower + d).collect(),
        (false, true) => TAIL_PROBES.iter().map(|d| upper - d).collect(),
        (false, false) => {
            let centre = interior_point(lower, upper);
            TAIL_PROBES.iter().flat_map(|d| [centre - d, centre + d]).collect()
        }
    }
}

impl Engine {
    /// Total mass of the PDF of `rv` and a non-negativity probe of every piece.
    pub fn verify_pdf(&self, rv: &RandomVariable) -> Result<DensityCheck, EngineError> {
        let pdf = self.form_of(rv, Form::Pdf)?;
        let mass = self.expected_value(&pdf, Some(&Expr::one()))?;
        let total_mass = mass
            .to_f64()
            .ok_or_else(|| EngineError::unsupported("verify_pdf", format!("total mass `{mass}` is not numeric")))?;

        let var = pdf.var();
        let mut negative_at = None;
        if pdf.nature() == Nature::DiscreteExplicit {
            let (masses, support) = self.explicit_masses(&pdf);
            negative_at = masses
                .iter()
                .zip(&support)
                .find(|(m, _)| m.to_f64().is_some_and(|v| v < 0.0))
                .and_then(|(_, s)| s.to_f64());
        } else {
            let breakpoints = pdf.numeric_breakpoints("verify_pdf")?;
            'pieces: for (i, (piece, pair)) in pdf.pieces().iter().zip(breakpoints.windows(2)).enumerate() {
                let points: Vec<f64> = match pdf.nature() {
                    Nature::DiscreteFunctional if pair[0].is_finite() => {
                        let last = if i + 2 == breakpoints.len() { pair[1] } else { pair[1] - 1.0 };
                        (0..INTEGER_PROBES).map(|j| pair[0] + j as f64).take_while(|k| *k <= last).collect()
                    }
                    _ => probe_points(pair[0], pair[1]),
                };
                for x in points {
                    if self.value_at("verify_pdf", Some(i), piece, var, x)? < 0.0 {
                        negative_at = Some(x);
                        break 'pieces;
                    }
                }
            }
        }
        Ok(DensityCheck { total_mass, negative_at })
    }
}
