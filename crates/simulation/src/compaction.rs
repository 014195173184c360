// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Visibility culling and compaction.
//
// Translates the sparse, index-addressed particle store into dense records a renderer can upload
// directly. Performs no physics.

use crate::bond::BondTable;
use crate::particle::Particles;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use periodic_table::SpeciesTable;
use rayon::prelude::*;
use static_assertions::const_assert_eq;
use std::mem;

/// Axis-aligned view rectangle in world units (x/y plane).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl ViewRect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Whether `position` lies within the rectangle grown by `margin`, bounds inclusive.
    #[inline]
    pub fn contains(&self, position: Vec3, margin: f32) -> bool {
        position.x >= self.min.x - margin
            && position.x <= self.max.x + margin
            && position.y >= self.min.y - margin
            && position.y <= self.max.y + margin
    }
}

/// GPU-ready particle record.
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RenderParticle {
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
    /// Global particle index.
    pub index: u32,
}

const_assert_eq!(mem::size_of::<RenderParticle>(), 32);

/// GPU-ready bond record: both endpoint positions and their global particle indices.
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RenderBond {
    pub start: [f32; 3],
    pub start_index: u32,
    pub end: [f32; 3],
    pub end_index: u32,
}

const_assert_eq!(mem::size_of::<RenderBond>(), 32);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub visible_particles: usize,
    pub visible_bonds: usize,
    pub active_particles: usize,
    pub active_bonds: usize,
    /// Active particles outside the view.
    pub culled: usize,
}

/// Output of one compaction. Reusing a frame across calls reuses its allocations.
#[derive(Debug, Clone, Default)]
pub struct RenderFrame {
    pub particles: Vec<RenderParticle>,
    pub bonds: Vec<RenderBond>,
    pub stats: FrameStats,
}

impl RenderFrame {
    pub fn clear(&mut self) {
        self.particles.clear();
        self.bonds.clear();
        self.stats = FrameStats::default();
    }

    pub fn as_particle_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }

    pub fn as_bond_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bonds)
    }
}

/// Overwrites `frame` with the particles inside `view` (grown by `margin`) in ascending index
/// order, and the bonds with at least one visible endpoint in ascending endpoint order.
pub(crate) fn compact_into(
    table: &SpeciesTable,
    particles: &Particles,
    bonds: &BondTable,
    view: &ViewRect,
    margin: f32,
    frame: &mut RenderFrame,
) {
    frame.clear();

    let visible: Vec<bool> = particles
        .position
        .par_iter()
        .zip(particles.active.par_iter())
        .map(|(&position, &active)| active && view.contains(position, margin))
        .collect();

    frame.particles.par_extend(
        (0..particles.slots())
            .into_par_iter()
            .filter(|&i| visible[i])
            .map(|i| {
                let species = &table[particles.species[i]];
                RenderParticle {
                    position: particles.position[i].to_array(),
                    radius: species.radius,
                    color: species.color,
                    index: i as u32,
                }
            }),
    );

    frame.bonds.par_extend(
        bonds
            .as_slice()
            .par_iter()
            .filter(|bond| visible[bond.a as usize] || visible[bond.b as usize])
            .map(|bond| RenderBond {
                start: particles.position[bond.a as usize].to_array(),
                start_index: bond.a,
                end: particles.position[bond.b as usize].to_array(),
                end_index: bond.b,
            }),
    );
    frame
        .bonds
        .par_sort_unstable_by_key(|bond| (bond.start_index, bond.end_index));

    frame.stats = FrameStats {
        visible_particles: frame.particles.len(),
        visible_bonds: frame.bonds.len(),
        active_particles: particles.active_count(),
        active_bonds: bonds.len(),
        culled: particles.active_count() - frame.particles.len(),
    };
}
