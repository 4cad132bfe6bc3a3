//! Tank mixing models.
//!
//! Four policies over a tank's segment chain. Every model keeps the
//! volume balance `inflow - outflow = delta volume`, never drives a
//! segment volume negative, and reports one representative
//! concentration per species for the host node to release downstream.

use crate::segment::{SegChain, SegmentArena};
use wq_core::{nearly_equal, Real, SegId, Tolerances, WqResult};
use wq_network::{MixingModel, Tank};

/// Per-tank mutable state owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct TankState {
    pub chain: SegChain,
    pub volume: Real,
}

/// Apply one step's inflow/outflow to a tank and write the
/// representative concentration into `out_conc`.
#[allow(clippy::too_many_arguments)]
pub fn mix_tank(
    arena: &mut SegmentArena,
    state: &mut TankState,
    tank: &Tank,
    inflow_vol: Real,
    inflow_conc: &[Real],
    outflow_vol: Real,
    tol: Tolerances,
    out_conc: &mut [Real],
) -> WqResult<()> {
    // A tank cannot deliver more water than it holds.
    let outflow_vol = outflow_vol.min(state.volume + inflow_vol);

    match tank.mixing {
        MixingModel::Mixed1 => mixed1(arena, state, inflow_vol, inflow_conc, outflow_vol, out_conc)?,
        MixingModel::Mixed2 => {
            mixed2(arena, state, tank, inflow_vol, inflow_conc, outflow_vol, out_conc)?
        }
        MixingModel::Fifo => plug(
            arena, state, false, inflow_vol, inflow_conc, outflow_vol, tol, out_conc,
        )?,
        MixingModel::Lifo => plug(
            arena, state, true, inflow_vol, inflow_conc, outflow_vol, tol, out_conc,
        )?,
    }

    state.volume = arena.chain_volume(state.chain);
    Ok(())
}

fn blend(conc: &mut [Real], vol: Real, other: &[Real], other_vol: Real) {
    let tot = vol + other_vol;
    if other_vol <= 0.0 || tot <= 0.0 {
        return;
    }
    for (c, &o) in conc.iter_mut().zip(other) {
        *c = (*c * vol + o * other_vol) / tot;
    }
}

/// First segment of the chain, allocating a zero-volume seed at
/// `conc` when the chain is empty.
fn ensure_first(
    arena: &mut SegmentArena,
    chain: &mut SegChain,
    conc: &[Real],
) -> WqResult<SegId> {
    if let Some(id) = chain.first {
        return Ok(id);
    }
    let id = arena.alloc(0.0, conc)?;
    arena.push_upstream(chain, id);
    Ok(id)
}

fn mixed1(
    arena: &mut SegmentArena,
    state: &mut TankState,
    inflow_vol: Real,
    inflow_conc: &[Real],
    outflow_vol: Real,
    out_conc: &mut [Real],
) -> WqResult<()> {
    let id = ensure_first(arena, &mut state.chain, out_conc)?;
    let seg = arena.get_mut(id);
    blend(&mut seg.conc, seg.volume, inflow_conc, inflow_vol);
    seg.volume = (seg.volume + inflow_vol - outflow_vol).max(0.0);
    out_conc.copy_from_slice(&seg.conc);
    Ok(())
}

/// Two-compartment model: a mixed inlet zone capped at a fraction of
/// the tank's initial volume, plus a stagnant zone that only exchanges
/// with the inlet zone when the tank fills past the cap or drains
/// below it.
fn mixed2(
    arena: &mut SegmentArena,
    state: &mut TankState,
    tank: &Tank,
    inflow_vol: Real,
    inflow_conc: &[Real],
    outflow_vol: Real,
    out_conc: &mut [Real],
) -> WqResult<()> {
    let zone_cap = tank.mix_zone_frac * tank.init_volume;
    if zone_cap <= 0.0 {
        return mixed1(arena, state, inflow_vol, inflow_conc, outflow_vol, out_conc);
    }

    let z1 = ensure_first(arena, &mut state.chain, out_conc)?;
    let z2 = match arena.get(z1).upstream() {
        Some(id) => id,
        None => {
            let seed = arena.get(z1).conc.clone();
            let id = arena.alloc(0.0, &seed)?;
            arena.push_upstream(&mut state.chain, id);
            id
        }
    };

    {
        let seg = arena.get_mut(z1);
        blend(&mut seg.conc, seg.volume, inflow_conc, inflow_vol);
        seg.volume = (seg.volume + inflow_vol - outflow_vol).max(0.0);
    }

    let v1 = arena.get(z1).volume;
    if v1 > zone_cap {
        // overflow into the stagnant zone
        let excess = v1 - zone_cap;
        let c1 = arena.get(z1).conc.clone();
        let seg2 = arena.get_mut(z2);
        blend(&mut seg2.conc, seg2.volume, &c1, excess);
        seg2.volume += excess;
        arena.get_mut(z1).volume = zone_cap;
    } else {
        let v2 = arena.get(z2).volume;
        let draw = (zone_cap - v1).min(v2);
        if draw > 0.0 {
            let c2 = arena.get(z2).conc.clone();
            let seg1 = arena.get_mut(z1);
            blend(&mut seg1.conc, seg1.volume, &c2, draw);
            seg1.volume += draw;
            arena.get_mut(z2).volume = v2 - draw;
        }
    }

    out_conc.copy_from_slice(&arena.get(z1).conc);
    Ok(())
}

/// FIFO and LIFO plug flow. Inflow lands at the chain's upstream end,
/// merging into the newest segment when chemically identical;
/// withdrawal consumes from the downstream end (FIFO) or the upstream
/// end (LIFO).
#[allow(clippy::too_many_arguments)]
fn plug(
    arena: &mut SegmentArena,
    state: &mut TankState,
    lifo: bool,
    inflow_vol: Real,
    inflow_conc: &[Real],
    outflow_vol: Real,
    tol: Tolerances,
    out_conc: &mut [Real],
) -> WqResult<()> {
    if inflow_vol > 0.0 {
        let mergeable = state.chain.last.filter(|&id| {
            arena
                .get(id)
                .conc
                .iter()
                .zip(inflow_conc)
                .all(|(&a, &b)| nearly_equal(a, b, tol))
        });
        if let Some(id) = mergeable {
            let seg = arena.get_mut(id);
            blend(&mut seg.conc, seg.volume, inflow_conc, inflow_vol);
            seg.volume += inflow_vol;
        } else {
            let id = arena.alloc(inflow_vol, inflow_conc)?;
            arena.push_upstream(&mut state.chain, id);
        }
    }

    let mut need = outflow_vol;
    let mut taken = 0.0;
    let mut mass = vec![0.0; out_conc.len()];
    while need > 0.0 {
        let Some(id) = (if lifo {
            state.chain.last
        } else {
            state.chain.first
        }) else {
            break;
        };
        let seg = arena.get_mut(id);
        if seg.volume > need {
            for (m, &c) in mass.iter_mut().zip(&seg.conc) {
                *m += c * need;
            }
            seg.volume -= need;
            taken += need;
            break;
        }
        for (m, &c) in mass.iter_mut().zip(&seg.conc) {
            *m += c * seg.volume;
        }
        taken += seg.volume;
        need -= seg.volume;
        let popped = if lifo {
            arena.pop_upstream(&mut state.chain)
        } else {
            arena.pop_downstream(&mut state.chain)
        };
        if let Some(p) = popped {
            arena.free(p);
        }
    }

    if taken > 0.0 {
        for (o, m) in out_conc.iter_mut().zip(&mass) {
            *o = m / taken;
        }
    } else if let Some(id) = if lifo {
        state.chain.last
    } else {
        state.chain.first
    } {
        out_conc.copy_from_slice(&arena.get(id).conc);
    }

    // keep a seed segment so the next step has something to merge into
    if state.chain.first.is_none() {
        let id = arena.alloc(0.0, out_conc)?;
        arena.push_upstream(&mut state.chain, id);
    }
    Ok(())
}
