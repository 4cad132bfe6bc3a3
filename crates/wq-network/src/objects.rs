//! Nodes, links, tanks, sources, and time patterns.

use wq_core::{NodeId, Real, SpeciesId, TankId};

/// External quality source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Sets the concentration of external inflow entering the node.
    Concentration,
    /// Adds mass at a fixed rate (mass/time) to whatever flow leaves the node.
    Mass,
    /// Raises the node's outflow concentration to at least the given value.
    Setpoint,
    /// Adds a fixed concentration to the node's outflow.
    FlowPaced,
}

/// A repeating multiplier sequence with a fixed period per factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// Seconds each factor stays active.
    pub period: Real,
    pub factors: Vec<Real>,
}

impl Pattern {
    /// Factor active at absolute time `t`, wrapping around the sequence.
    pub fn factor_at(&self, t: Real) -> Real {
        if self.factors.is_empty() || self.period <= 0.0 {
            return 1.0;
        }
        let slot = (t / self.period).floor() as usize % self.factors.len();
        self.factors[slot]
    }
}

/// An external quality source bound to one node and one species.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub kind: SourceKind,
    pub species: SpeciesId,
    /// Base strength: a concentration, or a mass rate for `Mass` sources.
    pub strength: Real,
    pub pattern: Option<Pattern>,
}

impl Source {
    /// Strength at time `t`, pattern applied.
    pub fn strength_at(&self, t: Real) -> Real {
        let factor = self.pattern.as_ref().map_or(1.0, |p| p.factor_at(t));
        self.strength * factor
    }
}

/// A junction, reservoir host, or tank host.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Tank hosted at this node, if any.
    pub tank: Option<TankId>,
    pub sources: Vec<Source>,
    /// Initial quality per species, fixed at build time.
    pub init_quality: Vec<Real>,
}

/// A pipe connecting two nodes. Flow sign convention: positive flow runs
/// `from` -> `to`.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Inner diameter (m).
    pub diameter: Real,
    /// Length (m).
    pub length: Real,
    /// Roughness coefficient (pipe wall), exposed to kinetic formulas.
    pub roughness: Real,
}

impl Link {
    /// Cross-sectional area (m^2).
    pub fn area(&self) -> Real {
        std::f64::consts::FRAC_PI_4 * self.diameter * self.diameter
    }

    /// Fixed geometric volume (m^3).
    pub fn volume(&self) -> Real {
        self.area() * self.length
    }

    /// Wetted interior surface area (m^2).
    pub fn surface_area(&self) -> Real {
        std::f64::consts::PI * self.diameter * self.length
    }
}

/// Tank mixing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixingModel {
    /// One fully mixed volume.
    #[default]
    Mixed1,
    /// A mixed inlet zone plus a stagnant zone.
    Mixed2,
    /// Plug flow, first in first out.
    Fifo,
    /// Plug flow, last in first out.
    Lifo,
}

/// A storage tank (or reservoir, when `area` is zero).
#[derive(Debug, Clone)]
pub struct Tank {
    /// Host node.
    pub node: NodeId,
    /// Cross-sectional area (m^2); zero marks a reservoir.
    pub area: Real,
    /// Volume at simulation start (m^3).
    pub init_volume: Real,
    pub mixing: MixingModel,
    /// Fraction of total volume forming the inlet mixing zone (Mixed2 only).
    pub mix_zone_frac: Real,
}

impl Tank {
    /// Reservoirs hold fixed quality and are excluded from mixing/reaction.
    pub fn is_reservoir(&self) -> bool {
        self.area == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wq_core::Id;

    #[test]
    fn pattern_wraps() {
        let p = Pattern {
            period: 10.0,
            factors: vec![1.0, 2.0, 0.5],
        };
        assert_eq!(p.factor_at(0.0), 1.0);
        assert_eq!(p.factor_at(15.0), 2.0);
        assert_eq!(p.factor_at(25.0), 0.5);
        assert_eq!(p.factor_at(30.0), 1.0); // wrapped
    }

    #[test]
    fn empty_pattern_is_unity() {
        let p = Pattern {
            period: 10.0,
            factors: vec![],
        };
        assert_eq!(p.factor_at(123.0), 1.0);
    }

    #[test]
    fn source_strength_applies_pattern() {
        let s = Source {
            kind: SourceKind::Mass,
            species: Id::from_index(0),
            strength: 2.0,
            pattern: Some(Pattern {
                period: 5.0,
                factors: vec![1.0, 3.0],
            }),
        };
        assert_eq!(s.strength_at(0.0), 2.0);
        assert_eq!(s.strength_at(6.0), 6.0);
    }

    #[test]
    fn link_geometry() {
        let link = Link {
            name: "P1".into(),
            from: Id::from_index(0),
            to: Id::from_index(1),
            diameter: 2.0,
            length: 10.0,
            roughness: 100.0,
        };
        assert!((link.area() - std::f64::consts::PI).abs() < 1e-12);
        assert!((link.volume() - 10.0 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn reservoir_flag() {
        let t = Tank {
            node: Id::from_index(0),
            area: 0.0,
            init_volume: 0.0,
            mixing: MixingModel::Mixed1,
            mix_zone_frac: 0.0,
        };
        assert!(t.is_reservoir());
    }
}
