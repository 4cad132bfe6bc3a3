//! Per-interval hydraulic state consumed from the external hydraulic solver.

use crate::error::{NetworkError, NetworkResult};
use crate::network::Network;
use wq_core::Real;

/// Open/closed status of a link during one hydraulic interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Open,
    Closed,
}

/// Sign of a link's flow, after the stagnation threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDir {
    /// Flow runs `to` -> `from`.
    Negative,
    /// Stagnant (or closed).
    Zero,
    /// Flow runs `from` -> `to`.
    Positive,
}

impl FlowDir {
    pub fn from_flow(q: Real, stagnant: Real) -> Self {
        if q.abs() < stagnant {
            FlowDir::Zero
        } else if q > 0.0 {
            FlowDir::Positive
        } else {
            FlowDir::Negative
        }
    }
}

/// One hydraulic interval's worth of solver output.
#[derive(Debug, Clone)]
pub struct HydraulicState {
    /// Net external demand per node (m^3/s); negative means external inflow.
    pub demands: Vec<Real>,
    /// Hydraulic head per node (m).
    pub heads: Vec<Real>,
    /// Signed flow per link (m^3/s).
    pub flows: Vec<Real>,
    pub status: Vec<LinkStatus>,
    /// Seconds until the next hydraulic change.
    pub duration: Real,
}

impl HydraulicState {
    /// Check the record sizes against the network.
    pub fn validate(&self, net: &Network) -> NetworkResult<()> {
        let n = net.nodes().len();
        let m = net.links().len();
        if self.demands.len() != n {
            return Err(NetworkError::HydraulicMismatch {
                what: "demand",
                got: self.demands.len(),
                want: n,
            });
        }
        if self.heads.len() != n {
            return Err(NetworkError::HydraulicMismatch {
                what: "head",
                got: self.heads.len(),
                want: n,
            });
        }
        if self.flows.len() != m {
            return Err(NetworkError::HydraulicMismatch {
                what: "flow",
                got: self.flows.len(),
                want: m,
            });
        }
        if self.status.len() != m {
            return Err(NetworkError::HydraulicMismatch {
                what: "status",
                got: self.status.len(),
                want: m,
            });
        }
        Ok(())
    }

    /// Effective flow in a link: zero when closed or stagnant.
    pub fn effective_flow(&self, link: usize, stagnant: Real) -> Real {
        if self.status[link] == LinkStatus::Closed {
            return 0.0;
        }
        let q = self.flows[link];
        if q.abs() < stagnant { 0.0 } else { q }
    }

    /// Flow directions for every link.
    pub fn directions(&self, stagnant: Real) -> Vec<FlowDir> {
        (0..self.flows.len())
            .map(|i| FlowDir::from_flow(self.effective_flow(i, stagnant), stagnant))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stagnation_threshold() {
        assert_eq!(FlowDir::from_flow(1e-10, 1e-8), FlowDir::Zero);
        assert_eq!(FlowDir::from_flow(0.5, 1e-8), FlowDir::Positive);
        assert_eq!(FlowDir::from_flow(-0.5, 1e-8), FlowDir::Negative);
    }

    #[test]
    fn closed_links_have_no_flow() {
        let hyd = HydraulicState {
            demands: vec![],
            heads: vec![],
            flows: vec![1.0],
            status: vec![LinkStatus::Closed],
            duration: 60.0,
        };
        assert_eq!(hyd.effective_flow(0, 1e-8), 0.0);
    }
}
