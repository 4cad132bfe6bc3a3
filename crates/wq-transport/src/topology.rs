//! Topological node ordering over the directed flow graph.
//!
//! Kahn's algorithm, seeded with all nodes of zero in-degree in index
//! order. When the queue drains before every node is placed, a cycle of
//! non-zero flows exists: the tie-break promotes the lowest-indexed
//! unplaced neighbor of the most recently placed node, which keeps the
//! ordering deterministic and guarantees termination.

use std::collections::VecDeque;
use wq_core::NodeId;
use wq_network::FlowAdjacency;

/// Node processing order consistent with the current flow directions.
pub fn flow_order(adj: &FlowAdjacency) -> Vec<NodeId> {
    let n = adj.n_nodes();
    let mut indeg: Vec<usize> = (0..n)
        .map(|i| adj.inflow(NodeId::from_index(i as u32)).len())
        .collect();
    let mut placed = vec![false; n];
    let mut order: Vec<NodeId> = Vec::with_capacity(n);
    let mut queue: VecDeque<NodeId> = (0..n)
        .filter(|&i| indeg[i] == 0)
        .map(|i| NodeId::from_index(i as u32))
        .collect();

    while order.len() < n {
        while let Some(u) = queue.pop_front() {
            if placed[u.usize()] {
                continue;
            }
            placed[u.usize()] = true;
            order.push(u);
            for &(v, _) in adj.outflow(u) {
                if placed[v.usize()] {
                    continue;
                }
                indeg[v.usize()] -= 1;
                if indeg[v.usize()] == 0 {
                    queue.push_back(v);
                }
            }
        }
        if order.len() < n {
            let v = promote(adj, &order, &placed, n);
            tracing::debug!(node = v.index(), "breaking flow cycle");
            indeg[v.usize()] = 0;
            queue.push_back(v);
        }
    }
    order
}

/// Pick the node to force-place when a cycle blocks progress: the
/// lowest-indexed unplaced neighbor of the most recently placed node,
/// falling back to the lowest-indexed unplaced node when no placed node
/// touches the cycle.
fn promote(adj: &FlowAdjacency, order: &[NodeId], placed: &[bool], n: usize) -> NodeId {
    for &u in order.iter().rev() {
        let candidate = adj
            .neighbors(u)
            .iter()
            .map(|&(v, _)| v)
            .filter(|v| !placed[v.usize()])
            .min();
        if let Some(v) = candidate {
            return v;
        }
    }
    let i = (0..n)
        .find(|&i| !placed[i])
        .unwrap_or(0);
    NodeId::from_index(i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wq_network::{FlowDir, Network, NetworkBuilder};

    fn line() -> Network {
        let mut b = NetworkBuilder::new();
        let a = b.add_node("A");
        let n2 = b.add_node("B");
        let c = b.add_node("C");
        b.add_link("P1", a, n2, 0.3, 100.0, 100.0);
        b.add_link("P2", n2, c, 0.3, 100.0, 100.0);
        b.build().unwrap()
    }

    #[test]
    fn line_orders_upstream_first() {
        let net = line();
        let mut adj = FlowAdjacency::new(&net);
        adj.rebuild(&net, &[FlowDir::Positive, FlowDir::Positive]);
        let order = flow_order(&adj);
        let names: Vec<_> = order.iter().map(|&n| net.node(n).name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn reversed_flow_reverses_order() {
        let net = line();
        let mut adj = FlowAdjacency::new(&net);
        adj.rebuild(&net, &[FlowDir::Negative, FlowDir::Negative]);
        let order = flow_order(&adj);
        let names: Vec<_> = order.iter().map(|&n| net.node(n).name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn cycle_is_broken_deterministically() {
        // A -> B -> C -> A, all flowing.
        let mut b = NetworkBuilder::new();
        let a = b.add_node("A");
        let n2 = b.add_node("B");
        let c = b.add_node("C");
        b.add_link("P1", a, n2, 0.3, 100.0, 100.0);
        b.add_link("P2", n2, c, 0.3, 100.0, 100.0);
        b.add_link("P3", c, a, 0.3, 100.0, 100.0);
        let net = b.build().unwrap();

        let mut adj = FlowAdjacency::new(&net);
        let dirs = vec![FlowDir::Positive; 3];
        adj.rebuild(&net, &dirs);

        let o1 = flow_order(&adj);
        let o2 = flow_order(&adj);
        assert_eq!(o1.len(), 3);
        assert_eq!(o1, o2);
    }

    #[test]
    fn stagnant_network_uses_index_order() {
        let net = line();
        let mut adj = FlowAdjacency::new(&net);
        adj.rebuild(&net, &[FlowDir::Zero, FlowDir::Zero]);
        let order = flow_order(&adj);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0].index(), 0);
    }
}
