//! Per-species mass-balance ledger.
//!
//! Accumulated over the whole run by the advection, source, dispersion,
//! and chemistry code paths. At the end of a run
//! `outflow + final ≈ initial + inflow + reacted` per species.

use wq_core::Real;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpeciesBalance {
    pub initial: Real,
    pub inflow: Real,
    pub outflow: Real,
    pub reacted: Real,
    pub stored: Real,
}

impl SpeciesBalance {
    /// Ratio of accounted-for mass to supplied mass; 1.0 when balanced.
    pub fn ratio(&self) -> Real {
        let supplied = self.initial + self.inflow + self.reacted;
        if supplied == 0.0 {
            if self.outflow + self.stored == 0.0 { 1.0 } else { 0.0 }
        } else {
            (self.outflow + self.stored) / supplied
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MassBalance {
    per_species: Vec<SpeciesBalance>,
}

impl MassBalance {
    pub fn new(n_species: usize) -> Self {
        Self {
            per_species: vec![SpeciesBalance::default(); n_species],
        }
    }

    pub fn species(&self, s: usize) -> &SpeciesBalance {
        &self.per_species[s]
    }

    pub fn set_initial(&mut self, s: usize, mass: Real) {
        self.per_species[s].initial = mass;
    }

    pub fn set_stored(&mut self, s: usize, mass: Real) {
        self.per_species[s].stored = mass;
    }

    pub fn add_inflow(&mut self, s: usize, mass: Real) {
        self.per_species[s].inflow += mass;
    }

    pub fn add_outflow(&mut self, s: usize, mass: Real) {
        self.per_species[s].outflow += mass;
    }

    pub fn add_reacted(&mut self, s: usize, mass: Real) {
        self.per_species[s].reacted += mass;
    }
}
