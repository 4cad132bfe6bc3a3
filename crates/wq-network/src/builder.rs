//! Incremental network builder with build-time validation.

use std::collections::HashSet;

use crate::error::{NetworkError, NetworkResult};
use crate::network::Network;
use crate::objects::{Link, MixingModel, Node, Source, Tank};
use crate::species::{Kinetics, Species};
use wq_core::{LinkId, NodeId, Real, SpeciesId, TankId};

/// Builder for constructing a network incrementally.
///
/// Use the `add_*` methods to assemble species, nodes, links, tanks, and
/// sources, then call `build()` to validate and freeze an immutable
/// [`Network`]. Object references are checked at build time and reported
/// with object names, so a malformed configuration fails once, up front.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    species: Vec<Species>,
    nodes: Vec<Node>,
    links: Vec<Link>,
    tanks: Vec<Tank>,
    initial_quality: Vec<(NodeId, SpeciesId, Real)>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_species(&mut self, species: Species) -> SpeciesId {
        let id = SpeciesId::from_index(self.species.len() as u32);
        self.species.push(species);
        id
    }

    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.into(),
            tank: None,
            sources: Vec::new(),
            init_quality: Vec::new(),
        });
        id
    }

    pub fn add_link(
        &mut self,
        name: impl Into<String>,
        from: NodeId,
        to: NodeId,
        diameter: Real,
        length: Real,
        roughness: Real,
    ) -> LinkId {
        let id = LinkId::from_index(self.links.len() as u32);
        self.links.push(Link {
            name: name.into(),
            from,
            to,
            diameter,
            length,
            roughness,
        });
        id
    }

    pub fn add_tank(
        &mut self,
        node: NodeId,
        area: Real,
        init_volume: Real,
        mixing: MixingModel,
        mix_zone_frac: Real,
    ) -> TankId {
        let id = TankId::from_index(self.tanks.len() as u32);
        self.tanks.push(Tank {
            node,
            area,
            init_volume,
            mixing,
            mix_zone_frac,
        });
        id
    }

    /// A reservoir is a zero-area tank with fixed quality.
    pub fn add_reservoir(&mut self, node: NodeId) -> TankId {
        self.add_tank(node, 0.0, 0.0, MixingModel::Mixed1, 0.0)
    }

    pub fn add_source(&mut self, node: NodeId, source: Source) {
        if let Some(n) = self.nodes.get_mut(node.usize()) {
            n.sources.push(source);
        }
    }

    pub fn set_initial_quality(&mut self, node: NodeId, species: SpeciesId, value: Real) {
        self.initial_quality.push((node, species, value));
    }

    pub fn set_pipe_kinetics(&mut self, species: SpeciesId, kinetics: Kinetics) {
        if let Some(s) = self.species.get_mut(species.usize()) {
            s.pipe_kinetics = kinetics;
        }
    }

    pub fn set_tank_kinetics(&mut self, species: SpeciesId, kinetics: Kinetics) {
        if let Some(s) = self.species.get_mut(species.usize()) {
            s.tank_kinetics = kinetics;
        }
    }

    /// Validate every cross-reference and freeze the network.
    pub fn build(mut self) -> NetworkResult<Network> {
        self.check_duplicate_names()?;
        self.check_links()?;
        self.check_tanks()?;
        self.check_sources()?;
        self.apply_initial_quality()?;
        Ok(Network {
            species: self.species,
            nodes: self.nodes,
            links: self.links,
            tanks: self.tanks,
        })
    }

    fn check_duplicate_names(&self) -> NetworkResult<()> {
        let mut seen = HashSet::new();
        for s in &self.species {
            if !seen.insert(s.name.as_str()) {
                return Err(NetworkError::DuplicateName {
                    kind: "species",
                    name: s.name.clone(),
                });
            }
        }
        seen.clear();
        for n in &self.nodes {
            if !seen.insert(n.name.as_str()) {
                return Err(NetworkError::DuplicateName {
                    kind: "node",
                    name: n.name.clone(),
                });
            }
        }
        seen.clear();
        for l in &self.links {
            if !seen.insert(l.name.as_str()) {
                return Err(NetworkError::DuplicateName {
                    kind: "link",
                    name: l.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_links(&self) -> NetworkResult<()> {
        for link in &self.links {
            for node in [link.from, link.to] {
                if node.usize() >= self.nodes.len() {
                    return Err(NetworkError::InvalidNodeRef {
                        link: link.name.clone(),
                        node: node.index(),
                    });
                }
            }
            if link.from == link.to {
                return Err(NetworkError::SelfLoop {
                    link: link.name.clone(),
                });
            }
            if link.diameter <= 0.0 {
                return Err(NetworkError::BadGeometry {
                    link: link.name.clone(),
                    what: "diameter",
                });
            }
            if link.length <= 0.0 {
                return Err(NetworkError::BadGeometry {
                    link: link.name.clone(),
                    what: "length",
                });
            }
        }
        Ok(())
    }

    fn check_tanks(&mut self) -> NetworkResult<()> {
        let mut hosts = HashSet::new();
        for (i, tank) in self.tanks.iter().enumerate() {
            if tank.node.usize() >= self.nodes.len() {
                return Err(NetworkError::InvalidTankNode {
                    node: tank.node.index(),
                });
            }
            if !hosts.insert(tank.node) {
                return Err(NetworkError::DuplicateTank {
                    node: tank.node.index(),
                });
            }
            self.nodes[tank.node.usize()].tank = Some(TankId::from_index(i as u32));
        }
        Ok(())
    }

    fn check_sources(&self) -> NetworkResult<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            for source in &node.sources {
                if source.species.usize() >= self.species.len() {
                    return Err(NetworkError::InvalidSourceSpecies {
                        node: i as u32,
                        species: source.species.index(),
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_initial_quality(&mut self) -> NetworkResult<()> {
        let ns = self.species.len();
        for node in &mut self.nodes {
            node.init_quality = vec![0.0; ns];
        }
        for &(node, species, value) in &self.initial_quality {
            if node.usize() >= self.nodes.len() {
                return Err(NetworkError::InvalidNodeIndex { node: node.index() });
            }
            if species.usize() >= ns {
                return Err(NetworkError::InvalidSpeciesRef {
                    species: species.index(),
                });
            }
            self.nodes[node.usize()].init_quality[species.usize()] = value;
        }
        Ok(())
    }
}
