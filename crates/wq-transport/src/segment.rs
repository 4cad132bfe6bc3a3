//! Segment arena.
//!
//! All water parcels live in one `Vec<Segment>`; freed slots go on a
//! free-index stack and are reused before the arena grows. Each pipe or
//! tank owns a doubly linked chain of segment indices ordered from the
//! most downstream parcel (`first`) to the most upstream (`last`).
//! Segments are recycled only on the stepping thread; the parallel
//! reaction phase reads the arena immutably.

use wq_core::{Real, SegId, WqError, WqResult};

/// One volume-homogeneous parcel of water.
#[derive(Debug, Clone)]
pub struct Segment {
    pub volume: Real,
    /// Concentration per species.
    pub conc: Vec<Real>,
    /// Concentration before the current chemistry phase, kept for
    /// reacted-mass deltas.
    pub prev_conc: Vec<Real>,
    /// Dispersion response scalars for the species currently being
    /// dispersed: particular solution plus unit responses to the
    /// upstream and downstream boundary concentrations.
    pub resp_part: Real,
    pub resp_up: Real,
    pub resp_dn: Real,
    pub(crate) down: Option<SegId>,
    pub(crate) up: Option<SegId>,
}

impl Segment {
    /// Index link toward the upstream end of the chain.
    pub fn upstream(&self) -> Option<SegId> {
        self.up
    }

    /// Index link toward the downstream end of the chain.
    pub fn downstream(&self) -> Option<SegId> {
        self.down
    }
}

/// Head/tail of one pipe's or tank's chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegChain {
    /// Most downstream segment (withdrawn first).
    pub first: Option<SegId>,
    /// Most upstream segment (inflow lands here).
    pub last: Option<SegId>,
    pub len: u32,
}

#[derive(Debug)]
pub struct SegmentArena {
    n_species: usize,
    segs: Vec<Segment>,
    free: Vec<SegId>,
}

impl SegmentArena {
    pub fn new(n_species: usize) -> Self {
        Self {
            n_species,
            segs: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    /// Take a segment from the free stack or grow the arena.
    pub fn alloc(&mut self, volume: Real, conc: &[Real]) -> WqResult<SegId> {
        if let Some(id) = self.free.pop() {
            let seg = &mut self.segs[id.usize()];
            seg.volume = volume;
            seg.conc.copy_from_slice(conc);
            seg.prev_conc.copy_from_slice(conc);
            seg.resp_part = 0.0;
            seg.resp_up = 0.0;
            seg.resp_dn = 0.0;
            seg.down = None;
            seg.up = None;
            return Ok(id);
        }
        self.segs
            .try_reserve(1)
            .map_err(|_| WqError::OutOfMemory {
                what: "segment arena",
            })?;
        let id = SegId::from_index(self.segs.len() as u32);
        self.segs.push(Segment {
            volume,
            conc: conc.to_vec(),
            prev_conc: conc.to_vec(),
            resp_part: 0.0,
            resp_up: 0.0,
            resp_dn: 0.0,
            down: None,
            up: None,
        });
        Ok(id)
    }

    /// Return a detached segment to the free stack.
    pub fn free(&mut self, id: SegId) {
        self.free.push(id);
    }

    pub fn get(&self, id: SegId) -> &Segment {
        &self.segs[id.usize()]
    }

    pub fn get_mut(&mut self, id: SegId) -> &mut Segment {
        &mut self.segs[id.usize()]
    }

    /// Append at the upstream (inflow) end.
    pub fn push_upstream(&mut self, chain: &mut SegChain, id: SegId) {
        self.segs[id.usize()].down = chain.last;
        self.segs[id.usize()].up = None;
        match chain.last {
            Some(old) => self.segs[old.usize()].up = Some(id),
            None => chain.first = Some(id),
        }
        chain.last = Some(id);
        chain.len += 1;
    }

    /// Append at the downstream (outlet) end.
    pub fn push_downstream(&mut self, chain: &mut SegChain, id: SegId) {
        self.segs[id.usize()].up = chain.first;
        self.segs[id.usize()].down = None;
        match chain.first {
            Some(old) => self.segs[old.usize()].down = Some(id),
            None => chain.last = Some(id),
        }
        chain.first = Some(id);
        chain.len += 1;
    }

    /// Detach the most downstream segment.
    pub fn pop_downstream(&mut self, chain: &mut SegChain) -> Option<SegId> {
        let id = chain.first?;
        let up = self.segs[id.usize()].up;
        chain.first = up;
        match up {
            Some(u) => self.segs[u.usize()].down = None,
            None => chain.last = None,
        }
        self.segs[id.usize()].up = None;
        self.segs[id.usize()].down = None;
        chain.len -= 1;
        Some(id)
    }

    /// Detach the most upstream segment.
    pub fn pop_upstream(&mut self, chain: &mut SegChain) -> Option<SegId> {
        let id = chain.last?;
        let down = self.segs[id.usize()].down;
        chain.last = down;
        match down {
            Some(d) => self.segs[d.usize()].up = None,
            None => chain.first = None,
        }
        self.segs[id.usize()].up = None;
        self.segs[id.usize()].down = None;
        chain.len -= 1;
        Some(id)
    }

    /// Reverse a chain in place, used when a pipe's flow flips sign.
    pub fn reverse(&mut self, chain: &mut SegChain) {
        let mut cur = chain.first;
        while let Some(id) = cur {
            let seg = &mut self.segs[id.usize()];
            core::mem::swap(&mut seg.up, &mut seg.down);
            cur = seg.down;
        }
        core::mem::swap(&mut chain.first, &mut chain.last);
    }

    /// Segments from downstream to upstream.
    pub fn iter(&self, chain: SegChain) -> ChainIter<'_> {
        ChainIter {
            arena: self,
            cur: chain.first,
        }
    }

    pub fn chain_volume(&self, chain: SegChain) -> Real {
        self.iter(chain).map(|id| self.get(id).volume).sum()
    }

    /// Total stored mass of one species over a chain, weighted by volume.
    pub fn chain_mass(&self, chain: SegChain, species: usize) -> Real {
        self.iter(chain)
            .map(|id| {
                let s = self.get(id);
                s.conc[species] * s.volume
            })
            .sum()
    }
}

pub struct ChainIter<'a> {
    arena: &'a SegmentArena,
    cur: Option<SegId>,
}

impl Iterator for ChainIter<'_> {
    type Item = SegId;

    fn next(&mut self) -> Option<SegId> {
        let id = self.cur?;
        self.cur = self.arena.get(id).up;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(arena: &mut SegmentArena, v: Real, c: Real) -> SegId {
        arena.alloc(v, &[c]).unwrap()
    }

    #[test]
    fn push_pop_both_ends() {
        let mut arena = SegmentArena::new(1);
        let mut chain = SegChain::default();

        let a = seg(&mut arena, 1.0, 0.1);
        let b = seg(&mut arena, 2.0, 0.2);
        let c = seg(&mut arena, 3.0, 0.3);
        arena.push_upstream(&mut chain, a);
        arena.push_upstream(&mut chain, b);
        arena.push_downstream(&mut chain, c);

        // downstream -> upstream: c, a, b
        let order: Vec<_> = arena.iter(chain).collect();
        assert_eq!(order, vec![c, a, b]);
        assert_eq!(chain.len, 3);
        assert_eq!(arena.chain_volume(chain), 6.0);

        assert_eq!(arena.pop_downstream(&mut chain), Some(c));
        assert_eq!(arena.pop_upstream(&mut chain), Some(b));
        assert_eq!(arena.pop_downstream(&mut chain), Some(a));
        assert_eq!(arena.pop_downstream(&mut chain), None);
        assert_eq!(chain.len, 0);
        assert!(chain.first.is_none() && chain.last.is_none());
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut arena = SegmentArena::new(1);
        let mut chain = SegChain::default();
        let a = seg(&mut arena, 1.0, 0.0);
        arena.push_upstream(&mut chain, a);
        let popped = arena.pop_upstream(&mut chain).unwrap();
        arena.free(popped);

        let b = seg(&mut arena, 5.0, 1.0);
        assert_eq!(b, a); // same slot
        assert_eq!(arena.get(b).volume, 5.0);
        assert_eq!(arena.get(b).conc[0], 1.0);
    }

    #[test]
    fn reverse_swaps_order() {
        let mut arena = SegmentArena::new(1);
        let mut chain = SegChain::default();
        let ids: Vec<_> = (0..4).map(|i| seg(&mut arena, 1.0, i as Real)).collect();
        for &id in &ids {
            arena.push_upstream(&mut chain, id);
        }
        arena.reverse(&mut chain);
        let order: Vec<_> = arena.iter(chain).collect();
        let reversed: Vec<_> = ids.iter().rev().copied().collect();
        assert_eq!(order, reversed);
        assert_eq!(chain.len, 4);
    }

    #[test]
    fn chain_mass_is_volume_weighted() {
        let mut arena = SegmentArena::new(1);
        let mut chain = SegChain::default();
        let a = seg(&mut arena, 2.0, 3.0);
        let b = seg(&mut arena, 4.0, 0.5);
        arena.push_upstream(&mut chain, a);
        arena.push_upstream(&mut chain, b);
        assert_eq!(arena.chain_mass(chain, 0), 8.0);
    }
}
