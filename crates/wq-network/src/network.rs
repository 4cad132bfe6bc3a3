//! The immutable, validated network.

use crate::objects::{Link, Node, Tank};
use crate::species::Species;
use wq_core::{LinkId, NodeId, SpeciesId, TankId};

/// A validated, immutable network: species, nodes, links, tanks.
///
/// Built via [`crate::builder::NetworkBuilder`]. All per-step mutable
/// state lives in the transport engine.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) species: Vec<Species>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) tanks: Vec<Tank>,
}

impl Network {
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn species_at(&self, id: SpeciesId) -> &Species {
        &self.species[id.usize()]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.usize()]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.usize()]
    }

    pub fn tank(&self, id: TankId) -> &Tank {
        &self.tanks[id.usize()]
    }

    /// Tank hosted at a node, if any.
    pub fn tank_at(&self, node: NodeId) -> Option<&Tank> {
        self.nodes[node.usize()].tank.map(|t| self.tank(t))
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        self.species
            .iter()
            .position(|s| s.name == name)
            .map(|i| SpeciesId::from_index(i as u32))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId::from_index(i as u32))
    }

    pub fn link_id(&self, name: &str) -> Option<LinkId> {
        self.links
            .iter()
            .position(|l| l.name == name)
            .map(|i| LinkId::from_index(i as u32))
    }
}
