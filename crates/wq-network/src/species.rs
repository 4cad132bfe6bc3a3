//! Chemical species and their kinetics.

use wq_core::Real;
use wq_express::Program;

/// Where a species lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesKind {
    /// Dissolved in the water volume, transported with flow.
    Bulk,
    /// Attached to the pipe interior surface; not advected.
    Wall,
}

/// How a species' concentration is defined within a pipe or tank.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Kinetics {
    /// Inert here; concentration changes only by transport.
    #[default]
    None,
    /// ODE right-hand side: dc/dt = expression.
    Rate(Program),
    /// Nonlinear constraint: expression = 0 at all times.
    Equilibrium(Program),
    /// Direct algebraic definition: c = expression.
    Formula(Program),
}

impl Kinetics {
    pub fn program(&self) -> Option<&Program> {
        match self {
            Kinetics::None => None,
            Kinetics::Rate(p) | Kinetics::Equilibrium(p) | Kinetics::Formula(p) => Some(p),
        }
    }
}

/// A chemical constituent. Immutable after network construction.
#[derive(Debug, Clone)]
pub struct Species {
    pub name: String,
    pub kind: SpeciesKind,
    /// Concentration units label, carried through to reporting.
    pub units: String,
    /// Absolute integration tolerance; falls back to the global option if None.
    pub abs_tol: Option<Real>,
    /// Relative integration tolerance; falls back to the global option if None.
    pub rel_tol: Option<Real>,
    /// Reporting precision (decimal places).
    pub precision: u8,
    /// Molecular diffusivity (m^2/s); 0 disables dispersion for this species.
    pub diffusivity: Real,
    /// Kinetics applied inside pipes.
    pub pipe_kinetics: Kinetics,
    /// Kinetics applied inside tanks.
    pub tank_kinetics: Kinetics,
}

impl Species {
    /// A bulk species with default tolerances and no kinetics.
    pub fn bulk(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SpeciesKind::Bulk,
            units: "mg/L".to_string(),
            abs_tol: None,
            rel_tol: None,
            precision: 4,
            diffusivity: 0.0,
            pipe_kinetics: Kinetics::None,
            tank_kinetics: Kinetics::None,
        }
    }

    /// A wall species with default tolerances and no kinetics.
    pub fn wall(name: impl Into<String>) -> Self {
        Self {
            kind: SpeciesKind::Wall,
            units: "mg/m2".to_string(),
            ..Self::bulk(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let b = Species::bulk("Cl2");
        assert_eq!(b.kind, SpeciesKind::Bulk);
        assert!(matches!(b.pipe_kinetics, Kinetics::None));

        let w = Species::wall("Biofilm");
        assert_eq!(w.kind, SpeciesKind::Wall);
        assert_eq!(w.name, "Biofilm");
    }
}
