/// Floating point type used throughout the engine.
pub type Real = f64;

/// Absolute/relative tolerance pair.
///
/// The default pair is deliberately tight: it gates segment merging
/// during advection, where two parcels are coalesced only when every
/// bulk concentration agrees, and a loose gate would smear fronts.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

/// Mixed absolute/relative comparison: absolute near zero, relative
/// against the larger magnitude otherwise.
pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    diff <= tol.abs || diff <= tol.rel * a.abs().max(b.abs())
}

/// Kinematic viscosity of water at 20 C (m^2/s), used by the dispersion
/// correlations and the Reynolds-number hydraulic variable.
pub const KINEMATIC_VISCOSITY: Real = 1.1e-6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_uses_both_tolerances() {
        let tol = Tolerances::default();
        // absolute branch near zero
        assert!(nearly_equal(0.0, 5e-13, tol));
        // relative branch at concentration scale
        assert!(nearly_equal(2.0, 2.0 + 1e-9, tol));
        assert!(!nearly_equal(2.0, 2.0 + 1e-6, tol));
    }

    #[test]
    fn nearly_equal_is_symmetric() {
        let tol = Tolerances::default();
        assert_eq!(nearly_equal(1.0, 3.0, tol), nearly_equal(3.0, 1.0, tol));
    }
}
