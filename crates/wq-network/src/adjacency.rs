//! Flow-direction-dependent adjacency lists.
//!
//! The undirected neighbor structure is fixed by the network topology and
//! built once (compact offset form, as the rest of the engine indexes it
//! heavily during dispersion assembly). The directed inflow/outflow lists
//! depend on the sign of each link's flow and are rebuilt only when a
//! direction changes since the previous hydraulic interval.

use crate::hydraulics::FlowDir;
use crate::network::Network;
use wq_core::{LinkId, NodeId};

#[derive(Debug, Clone)]
pub struct FlowAdjacency {
    n_nodes: usize,
    /// Offsets into `neighbors`: node i's neighbors occupy
    /// `neighbors[offsets[i]..offsets[i+1]]`.
    offsets: Vec<usize>,
    neighbors: Vec<(NodeId, LinkId)>,
    /// Links currently flowing into each node (water arrives here).
    inflow: Vec<Vec<(NodeId, LinkId)>>,
    /// Links currently flowing out of each node.
    outflow: Vec<Vec<(NodeId, LinkId)>>,
    /// Directions used for the last rebuild.
    dirs: Vec<FlowDir>,
}

impl FlowAdjacency {
    /// Build the static neighbor structure; directed lists start empty
    /// until the first `rebuild`.
    pub fn new(net: &Network) -> Self {
        let n = net.nodes().len();

        let mut per_node: Vec<Vec<(NodeId, LinkId)>> = vec![Vec::new(); n];
        for (i, link) in net.links().iter().enumerate() {
            let id = LinkId::from_index(i as u32);
            per_node[link.from.usize()].push((link.to, id));
            per_node[link.to.usize()].push((link.from, id));
        }
        // deterministic ordering by link index
        for list in &mut per_node {
            list.sort_by_key(|(_, l)| l.index());
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut neighbors = Vec::new();
        offsets.push(0);
        for list in &per_node {
            neighbors.extend_from_slice(list);
            offsets.push(neighbors.len());
        }

        Self {
            n_nodes: n,
            offsets,
            neighbors,
            inflow: vec![Vec::new(); n],
            outflow: vec![Vec::new(); n],
            dirs: Vec::new(),
        }
    }

    /// True when `dirs` differ from the directions of the last rebuild.
    pub fn directions_changed(&self, dirs: &[FlowDir]) -> bool {
        self.dirs != dirs
    }

    /// Rebuild the directed inflow/outflow lists from link directions.
    pub fn rebuild(&mut self, net: &Network, dirs: &[FlowDir]) {
        for list in self.inflow.iter_mut().chain(self.outflow.iter_mut()) {
            list.clear();
        }
        for (i, link) in net.links().iter().enumerate() {
            let id = LinkId::from_index(i as u32);
            let (up, dn) = match dirs[i] {
                FlowDir::Positive => (link.from, link.to),
                FlowDir::Negative => (link.to, link.from),
                FlowDir::Zero => continue,
            };
            self.outflow[up.usize()].push((dn, id));
            self.inflow[dn.usize()].push((up, id));
        }
        self.dirs = dirs.to_vec();
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// All neighbors of a node, regardless of flow direction.
    pub fn neighbors(&self, node: NodeId) -> &[(NodeId, LinkId)] {
        let i = node.usize();
        &self.neighbors[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Links currently delivering water to `node` (upstream node, link).
    pub fn inflow(&self, node: NodeId) -> &[(NodeId, LinkId)] {
        &self.inflow[node.usize()]
    }

    /// Links currently carrying water away from `node` (downstream node, link).
    pub fn outflow(&self, node: NodeId) -> &[(NodeId, LinkId)] {
        &self.outflow[node.usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetworkBuilder;

    fn three_node_line() -> Network {
        let mut b = NetworkBuilder::new();
        let n1 = b.add_node("A");
        let n2 = b.add_node("B");
        let n3 = b.add_node("C");
        b.add_link("P1", n1, n2, 0.3, 100.0, 100.0);
        b.add_link("P2", n2, n3, 0.3, 100.0, 100.0);
        b.build().unwrap()
    }

    #[test]
    fn static_neighbors() {
        let net = three_node_line();
        let adj = FlowAdjacency::new(&net);
        let b = net.node_id("B").unwrap();
        assert_eq!(adj.neighbors(b).len(), 2);
        assert_eq!(adj.neighbors(net.node_id("A").unwrap()).len(), 1);
    }

    #[test]
    fn rebuild_follows_signs() {
        let net = three_node_line();
        let mut adj = FlowAdjacency::new(&net);
        let a = net.node_id("A").unwrap();
        let b = net.node_id("B").unwrap();

        adj.rebuild(&net, &[FlowDir::Positive, FlowDir::Positive]);
        assert_eq!(adj.outflow(a).len(), 1);
        assert_eq!(adj.inflow(b).len(), 1);
        assert_eq!(adj.outflow(b).len(), 1);

        // reverse the first pipe
        adj.rebuild(&net, &[FlowDir::Negative, FlowDir::Positive]);
        assert_eq!(adj.outflow(a).len(), 0);
        assert_eq!(adj.inflow(a).len(), 1);
    }

    #[test]
    fn change_detection() {
        let net = three_node_line();
        let mut adj = FlowAdjacency::new(&net);
        let dirs = vec![FlowDir::Positive, FlowDir::Zero];
        assert!(adj.directions_changed(&dirs));
        adj.rebuild(&net, &dirs);
        assert!(!adj.directions_changed(&dirs));
        assert!(adj.directions_changed(&[FlowDir::Positive, FlowDir::Positive]));
    }

    #[test]
    fn stagnant_links_have_no_direction() {
        let net = three_node_line();
        let mut adj = FlowAdjacency::new(&net);
        adj.rebuild(&net, &[FlowDir::Zero, FlowDir::Zero]);
        for name in ["A", "B", "C"] {
            let id = net.node_id(name).unwrap();
            assert!(adj.inflow(id).is_empty());
            assert!(adj.outflow(id).is_empty());
        }
    }
}
