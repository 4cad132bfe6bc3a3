//! The variable namespace shared by kinetic expressions.
//!
//! Variable indices are partitioned into three ranges: species
//! concentrations, user parameters/constants, and hydraulic variables.
//! The expression compiler only sees opaque `u32` indices; this module
//! owns the encoding.

use wq_core::Real;
use wq_network::Network;

/// First index of the parameter range.
pub const PARAM_BASE: u32 = 0x0100_0000;
/// First index of the hydraulic-variable range.
pub const HYD_BASE: u32 = 0x0200_0000;

/// Hydraulic variables available to kinetic formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydVar {
    Diameter = 0,
    Flow,
    Velocity,
    Reynolds,
    ShearVelocity,
    FrictionFactor,
    /// Wetted surface area per unit volume.
    AreaVolRatio,
    Roughness,
    Length,
}

impl HydVar {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "D" => Self::Diameter,
            "Q" => Self::Flow,
            "U" => Self::Velocity,
            "Re" => Self::Reynolds,
            "Us" => Self::ShearVelocity,
            "Ff" => Self::FrictionFactor,
            "Av" => Self::AreaVolRatio,
            "Kc" => Self::Roughness,
            "Len" => Self::Length,
            _ => return None,
        })
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Diameter,
            1 => Self::Flow,
            2 => Self::Velocity,
            3 => Self::Reynolds,
            4 => Self::ShearVelocity,
            5 => Self::FrictionFactor,
            6 => Self::AreaVolRatio,
            7 => Self::Roughness,
            8 => Self::Length,
            _ => return None,
        })
    }
}

/// User-defined kinetic parameters and constants, by name.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    pub names: Vec<String>,
    pub values: Vec<Real>,
}

impl ParamTable {
    pub fn add(&mut self, name: impl Into<String>, value: Real) -> u32 {
        self.names.push(name.into());
        self.values.push(value);
        PARAM_BASE + (self.names.len() as u32 - 1)
    }

    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| PARAM_BASE + i as u32)
    }
}

/// Hydraulic environment of one segment, derived by the transport engine
/// from the link geometry and the current hydraulic interval. All zeros
/// for tank segments except the surface-area/volume ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegEnv {
    pub diameter: Real,
    pub flow: Real,
    pub velocity: Real,
    pub reynolds: Real,
    pub shear_velocity: Real,
    pub friction_factor: Real,
    pub av_ratio: Real,
    pub roughness: Real,
    pub length: Real,
}

/// Resolve one variable index against a segment's state.
pub fn lookup_var(var: u32, conc: &[Real], params: &[Real], env: &SegEnv) -> Real {
    if var >= HYD_BASE {
        let hv = HydVar::from_code(var - HYD_BASE);
        match hv {
            Some(HydVar::Diameter) => env.diameter,
            Some(HydVar::Flow) => env.flow,
            Some(HydVar::Velocity) => env.velocity,
            Some(HydVar::Reynolds) => env.reynolds,
            Some(HydVar::ShearVelocity) => env.shear_velocity,
            Some(HydVar::FrictionFactor) => env.friction_factor,
            Some(HydVar::AreaVolRatio) => env.av_ratio,
            Some(HydVar::Roughness) => env.roughness,
            Some(HydVar::Length) => env.length,
            None => 0.0,
        }
    } else if var >= PARAM_BASE {
        params
            .get((var - PARAM_BASE) as usize)
            .copied()
            .unwrap_or(0.0)
    } else {
        conc.get(var as usize).copied().unwrap_or(0.0)
    }
}

/// Build an identifier resolver for the expression compiler: species
/// names first, then parameters, then the hydraulic variables.
pub fn make_resolver<'a>(
    net: &'a Network,
    params: &'a ParamTable,
) -> impl FnMut(&str) -> Option<u32> + 'a {
    move |name: &str| {
        if let Some(id) = net.species_id(name) {
            return Some(id.index());
        }
        if let Some(ix) = params.index_of(name) {
            return Some(ix);
        }
        HydVar::from_name(name).map(|hv| HYD_BASE + hv as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wq_network::{NetworkBuilder, Species};

    #[test]
    fn namespace_partition() {
        let mut b = NetworkBuilder::new();
        b.add_species(Species::bulk("Cl2"));
        let net = b.build().unwrap();

        let mut params = ParamTable::default();
        let k = params.add("k", 0.5);

        let mut resolve = make_resolver(&net, &params);
        assert_eq!(resolve("Cl2"), Some(0));
        assert_eq!(resolve("k"), Some(k));
        assert_eq!(resolve("Re"), Some(HYD_BASE + HydVar::Reynolds as u32));
        assert_eq!(resolve("nonsense"), None);
    }

    #[test]
    fn lookup_each_range() {
        let conc = [1.5];
        let params = [0.5];
        let env = SegEnv {
            reynolds: 4000.0,
            ..Default::default()
        };
        assert_eq!(lookup_var(0, &conc, &params, &env), 1.5);
        assert_eq!(lookup_var(PARAM_BASE, &conc, &params, &env), 0.5);
        assert_eq!(
            lookup_var(HYD_BASE + HydVar::Reynolds as u32, &conc, &params, &env),
            4000.0
        );
    }
}
