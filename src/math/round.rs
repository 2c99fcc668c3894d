/// Digits kept when a computed breakpoint is snapped.
pub const SNAP_DIGITS: u32 = 12;

/// Round half to even at `digits` decimal places.
pub fn round(x: f64, digits: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    // split the scale so that 10^digits cannot overflow on its own
    let (pow1, pow2) = if digits > 22 {
        (10.0_f64.powi((digits - 22) as i32), 1e22)
    } else {
        (10.0_f64.powi(digits as i32), 1.0)
    };
    let y = (x * pow1) * pow2;
    if !y.is_finite() {
        return x;
    }
    let mut z = y.round();
    if (y - z).abs() == 0.5 {
        z = 2.0 * (y / 2.0).round();
    }
    (z / pow2) / pow1
}

/// Removes the floating-point dust left by products and sums of breakpoints,
/// e.g. `0.1 * 3 = 0.30000000000000004`. Values that are not within a few
/// ulps of a short decimal are returned unchanged.
pub fn snap(x: f64) -> f64 {
    let r = round(x, SNAP_DIGITS);
    if (r - x).abs() <= 8.0 * f64::EPSILON * x.abs() { r } else { x }
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(round(2.5, 0), 2.0);
        assert_eq!(round(3.5, 0), 4.0);
        assert_eq!(round(1.2345, 2), 1.23);
    }

    #[test]
    fn test_snap_removes_dust() {
        assert_eq!(snap(0.1 * 3.0), 0.3);
        assert_eq!(snap(f64::INFINITY), f64::INFINITY);
        assert_eq!(snap(std::f64::consts::E), std::f64::consts::E);
    }

    #[test]
    fn test_approx_eq_is_relative() {
        assert!(approx_eq(1e9, 1e9 + 0.5, 1e-9));
        assert!(!approx_eq(1.0, 1.1, 1e-9));
    }
}
