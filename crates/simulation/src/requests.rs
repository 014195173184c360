// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use crate::forces::MIN_DISTANCE;
use crate::particle::Particles;
use glam::Vec3;
use periodic_table::{SpeciesId, SpeciesTable};

/// A change requested by an external caller, validated when queued and applied at the next step
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Spawn {
        species: SpeciesId,
        position: Vec3,
        velocity: Vec3,
    },
    Remove {
        index: usize,
    },
    /// Radial velocity impulse around `center`, strongest at the center and fading to zero at
    /// `radius`. Negative strengths pull inward.
    Pulse {
        center: Vec3,
        radius: f32,
        strength: f32,
    },
}

/// Applies a pulse to every active particle within its radius.
pub(crate) fn apply_pulse(
    table: &SpeciesTable,
    particles: &mut Particles,
    center: Vec3,
    radius: f32,
    strength: f32,
) {
    for i in 0..particles.slots() {
        if !particles.active[i] {
            continue;
        }
        let delta = particles.position[i] - center;
        let distance = delta.length();
        if distance >= radius || distance < MIN_DISTANCE {
            continue;
        }
        let falloff = 1.0 - distance / radius;
        let inv_mass = table[particles.species[i]].inv_mass;
        particles.velocity[i] += delta / distance * (strength * falloff * inv_mass);
    }
}
