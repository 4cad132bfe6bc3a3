//! Species classification, done once at setup.
//!
//! Each species is sorted by its kinetics into one of three groups,
//! separately for pipes and tanks: rate species are integrated as an ODE
//! system, equilibrium species are solved by Newton iteration, formula
//! species are evaluated last from everything else.

use wq_core::SpeciesId;
use wq_network::{Kinetics, Network};

/// Species ids grouped by kinetic treatment, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SpeciesGroups {
    pub rate: Vec<SpeciesId>,
    pub equil: Vec<SpeciesId>,
    pub formula: Vec<SpeciesId>,
}

impl SpeciesGroups {
    /// True when no reactions apply at all, so the chemistry phase can
    /// be skipped for this element kind.
    pub fn is_inert(&self) -> bool {
        self.rate.is_empty() && self.equil.is_empty() && self.formula.is_empty()
    }
}

/// Pipe and tank groupings for one network.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub pipe: SpeciesGroups,
    pub tank: SpeciesGroups,
}

pub fn classify(net: &Network) -> Classification {
    let mut out = Classification::default();
    for (i, sp) in net.species().iter().enumerate() {
        let id = SpeciesId::from_index(i as u32);
        sort_into(&mut out.pipe, id, &sp.pipe_kinetics);
        sort_into(&mut out.tank, id, &sp.tank_kinetics);
    }
    out
}

fn sort_into(groups: &mut SpeciesGroups, id: SpeciesId, kin: &Kinetics) {
    match kin {
        Kinetics::None => {}
        Kinetics::Rate(_) => groups.rate.push(id),
        Kinetics::Equilibrium(_) => groups.equil.push(id),
        Kinetics::Formula(_) => groups.formula.push(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wq_express::compile;
    use wq_network::{NetworkBuilder, Species};

    fn program(src: &str) -> wq_express::Program {
        compile(src, |_| Some(0)).unwrap()
    }

    #[test]
    fn splits_by_kinetics_per_element_kind() {
        let mut b = NetworkBuilder::new();
        let mut cl2 = Species::bulk("Cl2");
        cl2.pipe_kinetics = Kinetics::Rate(program("0 - Cl2"));
        cl2.tank_kinetics = Kinetics::Rate(program("0 - Cl2"));
        b.add_species(cl2);

        let mut hocl = Species::bulk("HOCl");
        hocl.pipe_kinetics = Kinetics::Equilibrium(program("HOCl"));
        b.add_species(hocl);

        let mut age = Species::bulk("Age");
        age.pipe_kinetics = Kinetics::Formula(program("Age"));
        b.add_species(age);

        let net = b.build().unwrap();
        let c = classify(&net);

        assert_eq!(c.pipe.rate.len(), 1);
        assert_eq!(c.pipe.equil.len(), 1);
        assert_eq!(c.pipe.formula.len(), 1);
        assert_eq!(c.tank.rate.len(), 1);
        assert!(c.tank.equil.is_empty());
        assert!(!c.pipe.is_inert());
    }

    #[test]
    fn inert_network() {
        let mut b = NetworkBuilder::new();
        b.add_species(Species::bulk("Tracer"));
        let net = b.build().unwrap();
        let c = classify(&net);
        assert!(c.pipe.is_inert());
        assert!(c.tank.is_inert());
    }
}
