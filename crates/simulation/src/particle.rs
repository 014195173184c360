// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Particle storage.
//
// Particles are stored column-wise so that a parallel pass can mutate one column (say,
// velocities) while reading any other particle's entry in the remaining columns. Slots are never
// reallocated mid-step: the buffer reserves its full capacity up front and removed slots are
// recycled through a free-list between steps.

use glam::Vec3;
use periodic_table::SpeciesId;
use smallvec::SmallVec;

/// Bonded partners of one particle. Valence capacity is small, so this rarely spills.
pub type BondList = SmallVec<[u32; 4]>;

#[derive(Debug, Clone, Default)]
pub struct Particles {
    pub(crate) species: Vec<SpeciesId>,
    pub(crate) position: Vec<Vec3>,
    pub(crate) velocity: Vec<Vec3>,
    pub(crate) force: Vec<Vec3>,
    pub(crate) charge: Vec<f32>,
    pub(crate) bonds: Vec<BondList>,
    /// Valence slots in use, i.e. the sum of the orders of this particle's bonds.
    pub(crate) valence_used: Vec<u8>,
    pub(crate) molecule: Vec<u32>,
    pub(crate) active: Vec<bool>,
    free: Vec<u32>,
    active_count: usize,
    capacity: usize,
}

impl Particles {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            species: Vec::with_capacity(capacity),
            position: Vec::with_capacity(capacity),
            velocity: Vec::with_capacity(capacity),
            force: Vec::with_capacity(capacity),
            charge: Vec::with_capacity(capacity),
            bonds: Vec::with_capacity(capacity),
            valence_used: Vec::with_capacity(capacity),
            molecule: Vec::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
            free: Vec::new(),
            active_count: 0,
            capacity,
        }
    }

    /// Number of slots ever handed out, active or not.
    #[inline]
    pub fn slots(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        debug_assert!(capacity >= self.slots());
        self.capacity = capacity;
        let additional = capacity.saturating_sub(self.slots());
        self.species.reserve(additional);
        self.position.reserve(additional);
        self.velocity.reserve(additional);
        self.force.reserve(additional);
        self.charge.reserve(additional);
        self.bonds.reserve(additional);
        self.valence_used.reserve(additional);
        self.molecule.reserve(additional);
        self.active.reserve(additional);
    }

    /// Activates a slot, preferring the most recently freed one. Returns `None` when the buffer
    /// is full.
    pub(crate) fn insert(
        &mut self,
        species: SpeciesId,
        position: Vec3,
        velocity: Vec3,
    ) -> Option<usize> {
        let index = match self.free.pop() {
            Some(index) => {
                let i = index as usize;
                self.species[i] = species;
                self.position[i] = position;
                self.velocity[i] = velocity;
                self.force[i] = Vec3::ZERO;
                self.charge[i] = 0.0;
                self.bonds[i].clear();
                self.valence_used[i] = 0;
                self.molecule[i] = index;
                self.active[i] = true;
                i
            }
            None if self.slots() < self.capacity => {
                let i = self.slots();
                self.species.push(species);
                self.position.push(position);
                self.velocity.push(velocity);
                self.force.push(Vec3::ZERO);
                self.charge.push(0.0);
                self.bonds.push(BondList::new());
                self.valence_used.push(0);
                self.molecule.push(i as u32);
                self.active.push(true);
                i
            }
            None => return None,
        };
        self.active_count += 1;
        Some(index)
    }

    /// Deactivates a slot and returns it to the free-list. Bonds must already be gone.
    pub(crate) fn remove(&mut self, index: usize) {
        debug_assert!(self.active[index]);
        debug_assert!(self.bonds[index].is_empty());
        self.active[index] = false;
        self.velocity[index] = Vec3::ZERO;
        self.force[index] = Vec3::ZERO;
        self.charge[index] = 0.0;
        self.free.push(index as u32);
        self.active_count -= 1;
    }
}
