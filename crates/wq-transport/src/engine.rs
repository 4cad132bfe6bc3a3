//! The water-quality stepping engine.
//!
//! Owns every piece of per-step mutable state: the segment arena and the
//! per-pipe/per-tank chains, node concentrations, the flow adjacency and
//! its topological node order, and the mass-balance ledger. One call to
//! [`QualityEngine::step`] runs the five phases in order: pipe and tank
//! chemistry (pipes in parallel), advection with topological node
//! mixing and source injection, dispersion, and ledger upkeep.

use crate::dispersion::DispersionEngine;
use crate::error::{TransportError, TransportResult};
use crate::ledger::MassBalance;
use crate::pipeflow;
use crate::segment::{SegChain, SegmentArena};
use crate::tanks::{mix_tank, TankState};
use crate::topology;
use rayon::prelude::*;
use wq_chem::{classify, ChemWorker, Classification, ElementKind, ParamTable, SegEnv};
use wq_core::{nearly_equal, LinkId, NodeId, QualityOptions, Real, SegId, TankId, Tolerances};
use wq_network::{FlowAdjacency, FlowDir, HydraulicState, Network, SourceKind, SpeciesKind};

pub struct QualityEngine {
    net: Network,
    opts: QualityOptions,
    params: ParamTable,
    classes: Classification,
    /// `true` per species index for bulk species.
    bulk: Vec<bool>,
    arena: SegmentArena,
    /// Segment chain per link, downstream end first.
    chains: Vec<SegChain>,
    tank_states: Vec<TankState>,
    node_conc: Vec<Vec<Real>>,
    adj: FlowAdjacency,
    order: Vec<NodeId>,
    dirs: Vec<FlowDir>,
    /// Effective link flows for the current hydraulic interval.
    flows: Vec<Real>,
    demands: Vec<Real>,
    have_hydraulics: bool,
    /// Withdrawal shortfall per link within one transport phase; repaid
    /// out of the next release into that link. Non-zero only while a
    /// broken flow cycle forces a node to drain a not-yet-filled pipe.
    deficit: Vec<Real>,
    dispersion: DispersionEngine,
    tank_worker: ChemWorker,
    ledger: MassBalance,
    merge_tol: Tolerances,
    time: Real,
}

impl QualityEngine {
    pub fn new(net: Network, opts: QualityOptions, params: ParamTable) -> TransportResult<Self> {
        opts.validate()?;
        let ns = net.n_species();
        let n_links = net.links().len();
        let classes = classify(&net);
        let bulk: Vec<bool> = net
            .species()
            .iter()
            .map(|sp| sp.kind == SpeciesKind::Bulk)
            .collect();

        let mut arena = SegmentArena::new(ns);
        let mut chains = vec![SegChain::default(); n_links];
        let mut conc = vec![0.0; ns];
        for (li, link) in net.links().iter().enumerate() {
            let from = &net.node(link.from).init_quality;
            let to = &net.node(link.to).init_quality;
            for s in 0..ns {
                conc[s] = 0.5 * (from[s] + to[s]);
            }
            let id = arena.alloc(link.volume(), &conc)?;
            arena.push_upstream(&mut chains[li], id);
        }

        let mut tank_states = vec![TankState::default(); net.tanks().len()];
        for (ti, tank) in net.tanks().iter().enumerate() {
            if tank.is_reservoir() {
                continue;
            }
            let quality = &net.node(tank.node).init_quality;
            let id = arena.alloc(tank.init_volume, quality)?;
            arena.push_upstream(&mut tank_states[ti].chain, id);
            tank_states[ti].volume = tank.init_volume;
        }

        let node_conc: Vec<Vec<Real>> = net
            .nodes()
            .iter()
            .map(|n| n.init_quality.clone())
            .collect();

        let dirs = vec![FlowDir::Zero; n_links];
        let mut adj = FlowAdjacency::new(&net);
        adj.rebuild(&net, &dirs);
        let order = topology::flow_order(&adj);

        let tank_worker = ChemWorker::new(&net, &classes, &opts);
        let mut engine = Self {
            dispersion: DispersionEngine::new(n_links),
            ledger: MassBalance::new(ns),
            deficit: vec![0.0; n_links],
            flows: vec![0.0; n_links],
            demands: vec![0.0; net.nodes().len()],
            have_hydraulics: false,
            merge_tol: Tolerances::default(),
            time: 0.0,
            net,
            opts,
            params,
            classes,
            bulk,
            arena,
            chains,
            tank_states,
            node_conc,
            adj,
            order,
            dirs,
            tank_worker,
        };
        for s in 0..ns {
            let stored = engine.stored_mass(s);
            engine.ledger.set_initial(s, stored);
            engine.ledger.set_stored(s, stored);
        }
        Ok(engine)
    }

    /// Install a new hydraulic interval. Pipes whose flow flipped sign
    /// get their chains reversed; the adjacency and topological order
    /// are rebuilt only when some direction changed.
    pub fn set_hydraulics(&mut self, hyd: &HydraulicState) -> TransportResult<()> {
        hyd.validate(&self.net)?;
        let dirs = hyd.directions(self.opts.stagnant_flow);

        for li in 0..dirs.len() {
            let flipped = matches!(
                (self.dirs[li], dirs[li]),
                (FlowDir::Positive, FlowDir::Negative) | (FlowDir::Negative, FlowDir::Positive)
            );
            if flipped {
                self.arena.reverse(&mut self.chains[li]);
            }
        }
        if self.adj.directions_changed(&dirs) {
            self.adj.rebuild(&self.net, &dirs);
            self.order = topology::flow_order(&self.adj);
            tracing::debug!("flow directions changed; node order rebuilt");
        }
        self.flows = (0..dirs.len())
            .map(|li| hyd.effective_flow(li, self.opts.stagnant_flow))
            .collect();
        self.demands = hyd.demands.clone();
        self.dirs = dirs;
        self.have_hydraulics = true;
        Ok(())
    }

    /// Advance water quality by `dt` seconds within the current
    /// hydraulic interval.
    pub fn step(&mut self, dt: Real) -> TransportResult<()> {
        if !self.have_hydraulics {
            return Err(TransportError::MissingHydraulics);
        }
        self.react_pipes(dt)?;
        self.react_tanks(dt)?;
        self.transport(dt)?;
        self.disperse(dt)?;
        self.time += dt;
        Ok(())
    }

    pub fn time(&self) -> Real {
        self.time
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn options(&self) -> &QualityOptions {
        &self.opts
    }

    pub fn node_quality(&self, node: NodeId) -> &[Real] {
        &self.node_conc[node.usize()]
    }

    /// Volume-weighted average concentration over a pipe's segments.
    pub fn link_quality(&self, link: LinkId) -> Vec<Real> {
        let chain = self.chains[link.usize()];
        let ns = self.net.n_species();
        let mut mass = vec![0.0; ns];
        let mut vol = 0.0;
        for id in self.arena.iter(chain) {
            let seg = self.arena.get(id);
            vol += seg.volume;
            for s in 0..ns {
                mass[s] += seg.conc[s] * seg.volume;
            }
        }
        if vol > 0.0 {
            for m in &mut mass {
                *m /= vol;
            }
        }
        mass
    }

    pub fn tank_volume(&self, tank: TankId) -> Real {
        self.tank_states[tank.usize()].volume
    }

    /// Segment volume currently held by a pipe.
    pub fn link_volume(&self, link: LinkId) -> Real {
        self.arena.chain_volume(self.chains[link.usize()])
    }

    pub fn balance(&self) -> &MassBalance {
        &self.ledger
    }

    /// Refresh the stored-mass column and return the ledger; call at the
    /// end of a run before reading balance ratios.
    pub fn finalize(&mut self) -> &MassBalance {
        for s in 0..self.net.n_species() {
            let stored = self.stored_mass(s);
            self.ledger.set_stored(s, stored);
        }
        &self.ledger
    }

    fn stored_mass(&self, s: usize) -> Real {
        let mut total = 0.0;
        for (li, link) in self.net.links().iter().enumerate() {
            if self.bulk[s] {
                total += self.arena.chain_mass(self.chains[li], s);
            } else {
                let volume = link.volume();
                if volume > 0.0 {
                    let area_per_vol = link.surface_area() / volume;
                    for id in self.arena.iter(self.chains[li]) {
                        let seg = self.arena.get(id);
                        total += seg.conc[s] * seg.volume * area_per_vol;
                    }
                }
            }
        }
        if self.bulk[s] {
            for (ti, tank) in self.net.tanks().iter().enumerate() {
                if !tank.is_reservoir() {
                    total += self.arena.chain_mass(self.tank_states[ti].chain, s);
                }
            }
        }
        total
    }

    /// Phase 1a: react every pipe segment, pipes in parallel. Segment
    /// state is written back only after the whole parallel pass
    /// succeeded, so a chemistry failure leaves the step unapplied.
    fn react_pipes(&mut self, dt: Real) -> TransportResult<()> {
        if self.classes.pipe.is_inert() {
            return Ok(());
        }
        let net = &self.net;
        let classes = &self.classes;
        let opts = &self.opts;
        let params = &self.params.values;
        let arena = &self.arena;
        let chains = &self.chains;
        let flows = &self.flows;
        let t = self.time;

        let results: TransportResult<Vec<Vec<(SegId, Vec<Real>)>>> = (0..net.links().len())
            .into_par_iter()
            .map_init(
                || ChemWorker::new(net, classes, opts),
                |worker, li| {
                    let env = pipeflow::seg_env(&net.links()[li], flows[li]);
                    let mut out = Vec::with_capacity(chains[li].len as usize);
                    for id in arena.iter(chains[li]) {
                        let seg = arena.get(id);
                        if seg.volume <= 0.0 {
                            continue;
                        }
                        let mut conc = seg.conc.clone();
                        worker
                            .react_segment(
                                net,
                                classes,
                                ElementKind::Pipe,
                                &mut conc,
                                params,
                                &env,
                                t,
                                dt,
                            )
                            .map_err(|e| {
                                TransportError::chem(format!("pipe '{}'", net.links()[li].name), e)
                            })?;
                        out.push((id, conc));
                    }
                    Ok(out)
                },
            )
            .collect();

        for (li, updated) in results?.into_iter().enumerate() {
            let link = &self.net.links()[li];
            let area_per_vol = if link.volume() > 0.0 {
                link.surface_area() / link.volume()
            } else {
                0.0
            };
            for (id, conc) in updated {
                let seg = self.arena.get_mut(id);
                for s in 0..conc.len() {
                    let delta = conc[s] - seg.conc[s];
                    let weight = if self.bulk[s] {
                        seg.volume
                    } else {
                        seg.volume * area_per_vol
                    };
                    self.ledger.add_reacted(s, delta * weight);
                }
                seg.prev_conc.copy_from_slice(&seg.conc);
                seg.conc.copy_from_slice(&conc);
            }
        }
        Ok(())
    }

    /// Phase 1b: react tank segments serially on the stepping thread.
    fn react_tanks(&mut self, dt: Real) -> TransportResult<()> {
        if self.classes.tank.is_inert() {
            return Ok(());
        }
        let env = SegEnv::default();
        let t = self.time;
        for ti in 0..self.net.tanks().len() {
            if self.net.tanks()[ti].is_reservoir() {
                continue;
            }
            let host = self.net.tanks()[ti].node;
            let ids: Vec<SegId> = self.arena.iter(self.tank_states[ti].chain).collect();
            for id in ids {
                let seg = self.arena.get(id);
                if seg.volume <= 0.0 {
                    continue;
                }
                let mut conc = seg.conc.clone();
                self.tank_worker
                    .react_segment(
                        &self.net,
                        &self.classes,
                        ElementKind::Tank,
                        &mut conc,
                        &self.params.values,
                        &env,
                        t,
                        dt,
                    )
                    .map_err(|e| {
                        TransportError::chem(
                            format!("tank at node '{}'", self.net.node(host).name),
                            e,
                        )
                    })?;
                let seg = self.arena.get_mut(id);
                for s in 0..conc.len() {
                    if self.bulk[s] {
                        self.ledger.add_reacted(s, (conc[s] - seg.conc[s]) * seg.volume);
                    }
                }
                seg.prev_conc.copy_from_slice(&seg.conc);
                seg.conc.copy_from_slice(&conc);
            }
        }
        Ok(())
    }

    /// Phases 2-3: advection and topological node mixing. Each node, in
    /// flow order: drain the step's volume from every upstream pipe,
    /// mix (junction, tank dispatch, or fixed reservoir quality), apply
    /// external sources, and release into every downstream pipe.
    fn transport(&mut self, dt: Real) -> TransportResult<()> {
        let ns = self.net.n_species();
        self.deficit.iter_mut().for_each(|d| *d = 0.0);
        let order = self.order.clone();
        let mut mass_in = vec![0.0; ns];
        let mut conc = vec![0.0; ns];
        let mut tank_in = vec![0.0; ns];

        for &node in &order {
            let ni = node.usize();
            mass_in.fill(0.0);
            let mut vol_in = 0.0;

            let inflow: Vec<(NodeId, LinkId)> = self.adj.inflow(node).to_vec();
            for &(_, link) in &inflow {
                let li = link.usize();
                let want = self.flows[li].abs() * dt;
                let got = self.withdraw(li, want, &mut mass_in);
                vol_in += got;
                self.deficit[li] += want - got;
            }

            let dem = self.demands[ni];
            if dem < 0.0 {
                // external inflow: clean water unless a concentration
                // source sets its quality
                let v = -dem * dt;
                for si in 0..self.net.node(node).sources.len() {
                    let src = &self.net.node(node).sources[si];
                    if src.kind == SourceKind::Concentration {
                        let s = src.species.usize();
                        let m = src.strength_at(self.time) * v;
                        mass_in[s] += m;
                        self.ledger.add_inflow(s, m);
                    }
                }
                vol_in += v;
            }

            let outflow: Vec<(NodeId, LinkId)> = self.adj.outflow(node).to_vec();
            let mut vol_out = dem.max(0.0) * dt;
            for &(_, link) in &outflow {
                vol_out += self.flows[link.usize()].abs() * dt;
            }

            let tank_id = self.net.node(node).tank;
            let is_reservoir =
                tank_id.is_some_and(|tid| self.net.tank(tid).is_reservoir());

            if is_reservoir {
                conc.copy_from_slice(&self.net.node(node).init_quality);
                // water arriving at a reservoir leaves the system
                for s in 0..ns {
                    if self.bulk[s] && mass_in[s] != 0.0 {
                        self.ledger.add_outflow(s, mass_in[s]);
                    }
                }
            } else if let Some(tid) = tank_id {
                for s in 0..ns {
                    tank_in[s] = if vol_in > 0.0 { mass_in[s] / vol_in } else { 0.0 };
                }
                let tank = self.net.tank(tid);
                mix_tank(
                    &mut self.arena,
                    &mut self.tank_states[tid.usize()],
                    tank,
                    vol_in,
                    &tank_in,
                    vol_out,
                    self.merge_tol,
                    &mut conc,
                )?;
            } else if vol_in > 0.0 {
                for s in 0..ns {
                    conc[s] = if self.bulk[s] { mass_in[s] / vol_in } else { 0.0 };
                }
            } else {
                conc.copy_from_slice(&self.node_conc[ni]);
            }

            self.apply_sources(node, dt, vol_out, &mut conc);

            if dem > 0.0 {
                for s in 0..ns {
                    if self.bulk[s] {
                        self.ledger.add_outflow(s, conc[s] * dem * dt);
                    }
                }
            }

            for &(_, link) in &outflow {
                let li = link.usize();
                let pushed = self.release(li, self.flows[li].abs() * dt, &conc)?;
                if is_reservoir {
                    for s in 0..ns {
                        if self.bulk[s] {
                            self.ledger.add_inflow(s, conc[s] * pushed);
                        }
                    }
                }
            }

            self.node_conc[ni].copy_from_slice(&conc);
        }
        Ok(())
    }

    /// Drain up to `want` volume from a pipe's downstream end,
    /// accumulating bulk mass. Returns the volume actually drained.
    fn withdraw(&mut self, li: usize, want: Real, mass: &mut [Real]) -> Real {
        let mut need = want;
        let mut got = 0.0;
        while need > 0.0 {
            let Some(id) = self.chains[li].first else {
                break;
            };
            let seg = self.arena.get_mut(id);
            if seg.volume > need {
                for (s, m) in mass.iter_mut().enumerate() {
                    if self.bulk[s] {
                        *m += seg.conc[s] * need;
                    }
                }
                seg.volume -= need;
                got += need;
                break;
            }
            let drained_vol = seg.volume;
            let drained_conc = seg.conc.clone();
            for (s, m) in mass.iter_mut().enumerate() {
                if self.bulk[s] {
                    *m += drained_conc[s] * drained_vol;
                }
            }
            got += drained_vol;
            need -= drained_vol;
            if let Some(p) = self.arena.pop_downstream(&mut self.chains[li]) {
                // wall species stay on the pipe: fold the drained
                // segment's wall concentration into its neighbor
                if let Some(next) = self.chains[li].first {
                    let nseg = self.arena.get_mut(next);
                    let tot = nseg.volume + drained_vol;
                    if tot > 0.0 {
                        for s in 0..drained_conc.len() {
                            if !self.bulk[s] {
                                nseg.conc[s] = (nseg.conc[s] * nseg.volume
                                    + drained_conc[s] * drained_vol)
                                    / tot;
                            }
                        }
                    }
                }
                self.arena.free(p);
            }
        }
        got
    }

    /// Add `v` volume at `conc` to a pipe's upstream end, merging into
    /// the newest segment when the bulk concentrations match or the
    /// pipe is at its segment cap. Returns the volume actually added.
    fn release(&mut self, li: usize, v: Real, conc: &[Real]) -> TransportResult<Real> {
        let repay = v.min(self.deficit[li]);
        self.deficit[li] -= repay;
        let v = v - repay;
        if v <= 0.0 {
            return Ok(0.0);
        }

        if let Some(last) = self.chains[li].last {
            let at_cap = (self.chains[li].len as usize) >= self.opts.max_segments;
            let seg = self.arena.get_mut(last);
            let same = seg
                .conc
                .iter()
                .zip(conc)
                .enumerate()
                .all(|(s, (&a, &b))| !self.bulk[s] || nearly_equal(a, b, self.merge_tol));
            if same || at_cap {
                let tot = seg.volume + v;
                for s in 0..conc.len() {
                    let incoming = if self.bulk[s] { conc[s] } else { seg.conc[s] };
                    seg.conc[s] = (seg.conc[s] * seg.volume + incoming * v) / tot;
                }
                seg.volume = tot;
                return Ok(v);
            }
        }

        // new parcel; wall species continue at the neighboring level
        let mut c = conc.to_vec();
        if let Some(last) = self.chains[li].last {
            let prev = self.arena.get(last);
            for s in 0..c.len() {
                if !self.bulk[s] {
                    c[s] = prev.conc[s];
                }
            }
        }
        let id = self.arena.alloc(v, &c)?;
        let mut chain = self.chains[li];
        self.arena.push_upstream(&mut chain, id);
        self.chains[li] = chain;
        Ok(v)
    }

    /// Mass, setpoint, and flow-paced sources adjust the node's outflow
    /// concentration; added mass is booked as ledger inflow.
    fn apply_sources(&mut self, node: NodeId, dt: Real, vol_out: Real, conc: &mut [Real]) {
        for si in 0..self.net.node(node).sources.len() {
            let src = &self.net.node(node).sources[si];
            let s = src.species.usize();
            let strength = src.strength_at(self.time);
            match src.kind {
                SourceKind::Concentration => {} // applied to external inflow
                SourceKind::Mass => {
                    // strength is a mass rate; the injected mass is
                    // booked in full even when nothing flows out
                    let injected = strength * dt;
                    self.ledger.add_inflow(s, injected);
                    if vol_out > 0.0 {
                        conc[s] += injected / vol_out;
                    }
                }
                SourceKind::Setpoint => {
                    if conc[s] < strength {
                        self.ledger.add_inflow(s, (strength - conc[s]) * vol_out);
                        conc[s] = strength;
                    }
                }
                SourceKind::FlowPaced => {
                    self.ledger.add_inflow(s, strength * vol_out);
                    conc[s] += strength;
                }
            }
        }
    }

    /// Phase 4: dispersion for every bulk species with a molecular
    /// diffusivity configured.
    fn disperse(&mut self, dt: Real) -> TransportResult<()> {
        let ns = self.net.n_species();
        let n_nodes = self.net.nodes().len();
        let mut fixed_base = vec![false; n_nodes];
        for (ni, node) in self.net.nodes().iter().enumerate() {
            fixed_base[ni] = node.tank.is_some();
        }

        for s in 0..ns {
            if !self.bulk[s] {
                continue;
            }
            let molecular = self.net.species()[s].diffusivity;
            if molecular <= 0.0 {
                continue;
            }
            let mut fixed = fixed_base.clone();
            for (ni, node) in self.net.nodes().iter().enumerate() {
                if node
                    .sources
                    .iter()
                    .any(|src| src.kind == SourceKind::Concentration && src.species.usize() == s)
                {
                    fixed[ni] = true;
                }
            }
            self.dispersion.disperse_species(
                &self.net,
                &mut self.arena,
                &self.chains,
                &mut self.node_conc,
                &fixed,
                &self.flows,
                s,
                molecular,
                dt,
                &self.opts,
                &mut self.ledger,
            )?;
        }
        Ok(())
    }
}
