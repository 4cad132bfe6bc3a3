//! Longitudinal dispersion.
//!
//! Per species: an effective dispersion coefficient per pipe from a
//! Reynolds-dependent correlation, three tridiagonal response solves per
//! pipe (particular solution plus unit responses to each boundary
//! concentration), then one sparse symmetric nodal system coupling the
//! junction concentrations. Fixed-quality nodes (reservoirs, tanks, and
//! nodes with an active concentration source) enter as boundary values
//! instead of unknowns.

use crate::error::{TransportError, TransportResult};
use crate::ledger::MassBalance;
use crate::pipeflow;
use crate::segment::{SegChain, SegmentArena};
use wq_core::{QualityOptions, Real};
use wq_network::{Link, Network};
use wq_solver::{SparseSymSolver, TridiagSolver};

/// Effective longitudinal dispersion coefficient (m^2/s): a Taylor-style
/// laminar correlation below the transition Reynolds number, a shear
/// velocity correlation above it.
pub fn effective_coefficient(link: &Link, u: Real, molecular: Real) -> Real {
    let re = pipeflow::reynolds(link, u);
    let radius = link.diameter / 2.0;
    if re < pipeflow::LAMINAR_REYNOLDS {
        if molecular <= 0.0 {
            return 0.0;
        }
        radius * radius * u * u / (48.0 * molecular) + molecular
    } else {
        let f = pipeflow::friction_factor(link, re);
        10.1 * radius * pipeflow::shear_velocity(u, f)
    }
}

/// Owns all dispersion scratch state, reused across species and steps.
#[derive(Debug, Default)]
pub struct DispersionEngine {
    tridiag: TridiagSolver,
    // per-pipe assembly scratch
    cells: Vec<wq_core::SegId>,
    dx: Vec<Real>,
    gap: Vec<Real>,
    sub: Vec<Real>,
    diag: Vec<Real>,
    sup: Vec<Real>,
    rhs_p: Vec<Real>,
    rhs_u: Vec<Real>,
    rhs_d: Vec<Real>,
    // per-link results for the nodal assembly
    active: Vec<bool>,
    beta_up: Vec<Real>,
    beta_dn: Vec<Real>,
    up_node: Vec<usize>,
    dn_node: Vec<usize>,
    end_up: Vec<[Real; 3]>,
    end_dn: Vec<[Real; 3]>,
}

impl DispersionEngine {
    pub fn new(n_links: usize) -> Self {
        Self {
            active: vec![false; n_links],
            beta_up: vec![0.0; n_links],
            beta_dn: vec![0.0; n_links],
            up_node: vec![0; n_links],
            dn_node: vec![0; n_links],
            end_up: vec![[0.0; 3]; n_links],
            end_dn: vec![[0.0; 3]; n_links],
            ..Default::default()
        }
    }

    /// Run the dispersion update for one species over every pipe.
    #[allow(clippy::too_many_arguments)]
    pub fn disperse_species(
        &mut self,
        net: &Network,
        arena: &mut SegmentArena,
        chains: &[SegChain],
        node_conc: &mut [Vec<Real>],
        fixed: &[bool],
        flows: &[Real],
        s: usize,
        molecular: Real,
        dt: Real,
        opts: &QualityOptions,
        ledger: &mut MassBalance,
    ) -> TransportResult<()> {
        let n_links = net.links().len();
        self.active.iter_mut().for_each(|a| *a = false);

        for li in 0..n_links {
            self.pipe_responses(net, arena, chains[li], flows[li], li, s, molecular, dt, opts)
                .map_err(|source| TransportError::Dispersion {
                    species: net.species()[s].name.clone(),
                    source,
                })?;
        }

        self.solve_nodes(net, node_conc, fixed, s)
            .map_err(|source| TransportError::Dispersion {
                species: net.species()[s].name.clone(),
                source,
            })?;

        self.update_segments(arena, chains, node_conc, fixed, s, dt, ledger);
        Ok(())
    }

    /// Steps 1-2: effective coefficient and the three tridiagonal
    /// response solves for one pipe. Marks the link active when
    /// dispersion is numerically significant there.
    #[allow(clippy::too_many_arguments)]
    fn pipe_responses(
        &mut self,
        net: &Network,
        arena: &mut SegmentArena,
        chain: SegChain,
        q: Real,
        li: usize,
        s: usize,
        molecular: Real,
        dt: Real,
        opts: &QualityOptions,
    ) -> wq_solver::SolverResult<()> {
        let link = &net.links()[li];
        let u = pipeflow::velocity(link, q);
        if u <= 0.0 {
            return Ok(());
        }
        let e = effective_coefficient(link, u, molecular);
        if e <= 0.0 {
            return Ok(());
        }
        let peclet = u * link.length / e;
        if peclet > opts.peclet_limit {
            return Ok(());
        }

        self.cells.clear();
        for id in arena.iter(chain) {
            if arena.get(id).volume > 0.0 {
                self.cells.push(id);
            }
        }
        let m = self.cells.len();
        if m == 0 {
            return Ok(());
        }

        let area = link.area();
        let ea = e * area;
        self.dx.clear();
        self.dx
            .extend(self.cells.iter().map(|&id| arena.get(id).volume / area));
        self.gap.clear();
        for i in 0..m.saturating_sub(1) {
            self.gap.push(ea / (0.5 * (self.dx[i] + self.dx[i + 1])));
        }
        let g_dn = ea / (0.5 * self.dx[0]);
        let g_up = ea / (0.5 * self.dx[m - 1]);

        self.sub.resize(m, 0.0);
        self.diag.resize(m, 0.0);
        self.sup.resize(m, 0.0);
        self.rhs_p.resize(m, 0.0);
        self.rhs_u.resize(m, 0.0);
        self.rhs_d.resize(m, 0.0);

        for i in 0..m {
            let vol = arena.get(self.cells[i]).volume;
            let g_left = if i == 0 { g_dn } else { self.gap[i - 1] };
            let g_right = if i == m - 1 { g_up } else { self.gap[i] };
            self.diag[i] = vol / dt + g_left + g_right;
            self.sub[i] = if i == 0 { 0.0 } else { -self.gap[i - 1] };
            self.sup[i] = if i == m - 1 { 0.0 } else { -self.gap[i] };
            self.rhs_p[i] = vol / dt * arena.get(self.cells[i]).conc[s];
            self.rhs_u[i] = 0.0;
            self.rhs_d[i] = 0.0;
        }
        self.rhs_u[m - 1] = g_up;
        self.rhs_d[0] = g_dn;

        self.tridiag
            .solve(&self.sub, &self.diag, &self.sup, &mut self.rhs_p)?;
        self.tridiag
            .solve(&self.sub, &self.diag, &self.sup, &mut self.rhs_u)?;
        self.tridiag
            .solve(&self.sub, &self.diag, &self.sup, &mut self.rhs_d)?;

        for (i, &id) in self.cells.iter().enumerate() {
            let seg = arena.get_mut(id);
            seg.resp_part = self.rhs_p[i];
            seg.resp_up = self.rhs_u[i];
            seg.resp_dn = self.rhs_d[i];
        }

        let (up, dn) = if q >= 0.0 {
            (link.from.usize(), link.to.usize())
        } else {
            (link.to.usize(), link.from.usize())
        };
        self.active[li] = true;
        self.beta_dn[li] = g_dn;
        self.beta_up[li] = g_up;
        self.up_node[li] = up;
        self.dn_node[li] = dn;
        self.end_dn[li] = [self.rhs_p[0], self.rhs_u[0], self.rhs_d[0]];
        self.end_up[li] = [self.rhs_p[m - 1], self.rhs_u[m - 1], self.rhs_d[m - 1]];
        Ok(())
    }

    /// Step 3: assemble and solve the nodal system over the junctions
    /// touched by at least one active pipe.
    fn solve_nodes(
        &mut self,
        net: &Network,
        node_conc: &mut [Vec<Real>],
        fixed: &[bool],
        s: usize,
    ) -> wq_solver::SolverResult<()> {
        let n_nodes = net.nodes().len();
        let mut row: Vec<Option<usize>> = vec![None; n_nodes];
        let mut rows: Vec<usize> = Vec::new();
        for li in 0..self.active.len() {
            if !self.active[li] {
                continue;
            }
            for node in [self.up_node[li], self.dn_node[li]] {
                if !fixed[node] && row[node].is_none() {
                    row[node] = Some(rows.len());
                    rows.push(node);
                }
            }
        }
        if rows.is_empty() {
            return Ok(());
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for li in 0..self.active.len() {
            if !self.active[li] {
                continue;
            }
            if let (Some(ra), Some(rb)) = (row[self.up_node[li]], row[self.dn_node[li]]) {
                edges.push((ra, rb));
            }
        }

        let mut sys = SparseSymSolver::new(rows.len(), &edges)?;
        sys.begin();
        let mut rhs = vec![0.0; rows.len()];

        for li in 0..self.active.len() {
            if !self.active[li] {
                continue;
            }
            let (a, b) = (self.up_node[li], self.dn_node[li]);
            let [p1, u1, d1] = self.end_dn[li];
            let [pn, un, dn_] = self.end_up[li];
            let (bu, bd) = (self.beta_up[li], self.beta_dn[li]);

            if let Some(rb) = row[b] {
                sys.add_diag(rb, bd * (1.0 - d1));
                rhs[rb] += bd * p1;
                if row[a].is_none() {
                    rhs[rb] += bd * u1 * node_conc[a][s];
                }
            }
            if let Some(ra) = row[a] {
                sys.add_diag(ra, bu * (1.0 - un));
                rhs[ra] += bu * pn;
                if row[b].is_none() {
                    rhs[ra] += bu * dn_ * node_conc[b][s];
                }
            }
            if let (Some(ra), Some(rb)) = (row[a], row[b]) {
                // symmetric coupling; the two discrete forms agree up to
                // rounding, so average them
                sys.add_offdiag(ra, rb, -0.5 * (bd * u1 + bu * dn_))?;
            }
        }

        sys.factor()?;
        sys.solve(&mut rhs)?;

        for (r, &node) in rows.iter().enumerate() {
            node_conc[node][s] = rhs[r].max(0.0);
        }
        Ok(())
    }

    /// Step 4: push the solved boundary concentrations back through each
    /// pipe's response functions and account boundary mass exchange.
    #[allow(clippy::too_many_arguments)]
    fn update_segments(
        &mut self,
        arena: &mut SegmentArena,
        chains: &[SegChain],
        node_conc: &[Vec<Real>],
        fixed: &[bool],
        s: usize,
        dt: Real,
        ledger: &mut MassBalance,
    ) {
        for li in 0..self.active.len() {
            if !self.active[li] {
                continue;
            }
            let ca = node_conc[self.up_node[li]][s];
            let cb = node_conc[self.dn_node[li]][s];

            let mut first = None;
            let mut last = None;
            let ids: Vec<_> = arena.iter(chains[li]).collect();
            for id in ids {
                let seg = arena.get_mut(id);
                if seg.volume <= 0.0 {
                    continue;
                }
                seg.conc[s] = (seg.resp_part + seg.resp_up * ca + seg.resp_dn * cb).max(0.0);
                if first.is_none() {
                    first = Some(seg.conc[s]);
                }
                last = Some(seg.conc[s]);
            }
            let (Some(c_first), Some(c_last)) = (first, last) else {
                continue;
            };

            // dispersive mass crossing a fixed boundary enters or leaves
            // the accounted system
            if fixed[self.dn_node[li]] {
                book_boundary(ledger, s, self.beta_dn[li] * (cb - c_first) * dt);
            }
            if fixed[self.up_node[li]] {
                book_boundary(ledger, s, self.beta_up[li] * (ca - c_last) * dt);
            }
        }
    }
}

fn book_boundary(ledger: &mut MassBalance, s: usize, mass: Real) {
    if mass >= 0.0 {
        ledger.add_inflow(s, mass);
    } else {
        ledger.add_outflow(s, -mass);
    }
}
