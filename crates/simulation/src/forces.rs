// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Force contributors.
//
// Contributors are plain enum values registered once, when the simulation is built, and run in
// registration order inside a single fused per-particle pass:
// - Pre-step contributors write the particle's force accumulator.
// - Post-step contributors run after integration and adjust the particle's velocity.
// Each parallel task writes only its own particle.

use crate::context::StepContext;
use crate::dihedral;
use crate::particle::Particles;
use crate::rng::{self, Stream};
use crate::zones;
use glam::Vec3;
use periodic_table::SpeciesId;
use rand::Rng;
use rayon::prelude::*;

/// Distances below this are treated as coincident.
pub(crate) const MIN_DISTANCE: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreStepForce {
    /// Affinity-weighted attraction and soft contact repulsion between unbonded neighbors.
    AffinityPairs,
    /// The configured uniform gravity field.
    Gravity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStepForce {
    /// Brownian velocity kick scaled by the local temperature.
    ThermalJitter,
    /// Repulsion between unbonded neighbors carrying partial charges of the same sign.
    ChargeRepulsion,
    /// Torsion of bonded chains toward the anti-periplanar arrangement.
    Dihedral,
}

/// The ordered force contributors of a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcePipeline {
    pub pre_step: Vec<PreStepForce>,
    pub post_step: Vec<PostStepForce>,
}

impl Default for ForcePipeline {
    fn default() -> Self {
        Self {
            pre_step: vec![PreStepForce::AffinityPairs, PreStepForce::Gravity],
            post_step: vec![
                PostStepForce::ThermalJitter,
                PostStepForce::ChargeRepulsion,
                PostStepForce::Dihedral,
            ],
        }
    }
}

impl ForcePipeline {
    pub fn new(pre_step: Vec<PreStepForce>, post_step: Vec<PostStepForce>) -> Self {
        Self {
            pre_step,
            post_step,
        }
    }

    /// Recomputes every active particle's force accumulator from scratch.
    pub(crate) fn accumulate(&self, ctx: &StepContext, particles: &mut Particles) {
        let Particles {
            force,
            position,
            species,
            bonds,
            active,
            ..
        } = particles;
        let (position, species, bonds, active) = (&*position, &*species, &*bonds, &*active);
        let epsilon_sq = ctx.config.force_epsilon * ctx.config.force_epsilon;

        force.par_iter_mut().enumerate().for_each(|(i, f)| {
            *f = Vec3::ZERO;
            if !active[i] {
                return;
            }
            for contributor in &self.pre_step {
                match contributor {
                    PreStepForce::AffinityPairs => {
                        *f += pair_force(ctx, i, position, species, |j| {
                            bonds[i].contains(&(j as u32))
                        });
                    }
                    PreStepForce::Gravity => {
                        *f += ctx.config.gravity * ctx.species(species[i]).mass;
                    }
                }
            }
            if f.length_squared() < epsilon_sq {
                *f = Vec3::ZERO;
            }
        });
    }

    /// Applies the post-step contributors to the velocities of every active particle.
    pub(crate) fn apply_post_step(&self, ctx: &StepContext, particles: &mut Particles) {
        let snapshot = if self.post_step.contains(&PostStepForce::Dihedral) {
            particles.velocity.clone()
        } else {
            Vec::new()
        };
        let Particles {
            velocity,
            position,
            species,
            charge,
            bonds,
            active,
            ..
        } = particles;
        let (position, species, charge, bonds, active) =
            (&*position, &*species, &*charge, &*bonds, &*active);

        velocity.par_iter_mut().enumerate().for_each(|(i, v)| {
            if !active[i] {
                return;
            }
            for contributor in &self.post_step {
                match contributor {
                    PostStepForce::ThermalJitter => {
                        *v += thermal_kick(ctx, i, position[i], ctx.species(species[i]).inv_mass);
                    }
                    PostStepForce::ChargeRepulsion => {
                        *v += charge_repulsion(ctx, i, position, species, charge, |j| {
                            bonds[i].contains(&(j as u32))
                        });
                    }
                    PostStepForce::Dihedral => {
                        *v += dihedral::impulse(ctx, i, position, bonds, &snapshot)
                            * ctx.species(species[i]).inv_mass;
                    }
                }
            }
        });
    }
}

/// Attraction `attraction_strength * affinity * (1 - d / interaction_radius)` toward each unbonded
/// neighbor, plus soft repulsion `repulsion_strength * (1 - d / contact)` once the two spheres
/// overlap.
fn pair_force(
    ctx: &StepContext,
    i: usize,
    position: &[Vec3],
    species: &[SpeciesId],
    is_bonded: impl Fn(usize) -> bool,
) -> Vec3 {
    let config = ctx.config;
    let own = ctx.species(species[i]);
    let mut total = Vec3::ZERO;

    ctx.grid
        .for_each_neighbor(position, i, config.interaction_radius, |j| {
            if is_bonded(j) {
                return;
            }
            let delta = position[j] - position[i];
            let distance = delta.length();
            if distance < MIN_DISTANCE {
                return;
            }
            let direction = delta / distance;
            let other = ctx.species(species[j]);

            let affinity = ctx.table.affinity(species[i], species[j]);
            let mut magnitude = config.attraction_strength
                * affinity
                * (1.0 - distance / config.interaction_radius);

            let contact = own.radius + other.radius;
            if distance < contact {
                magnitude -= config.repulsion_strength * (1.0 - distance / contact);
            }
            total += direction * magnitude;
        });

    total
}

/// Velocity kick of magnitude up to `sqrt(k * T_local / m)` in a direction drawn from the
/// particle's own random stream.
fn thermal_kick(ctx: &StepContext, i: usize, position: Vec3, inv_mass: f32) -> Vec3 {
    let config = ctx.config;
    let temperature = zones::local_temperature(config.temperature, &config.zones, position);
    if temperature <= 0.0 || config.boltzmann <= 0.0 {
        return Vec3::ZERO;
    }
    let sigma = (config.boltzmann * temperature * inv_mass).sqrt();
    let mut rng = rng::stream_rng(config.seed, ctx.step, Stream::Thermal, i as u64);
    Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    ) * sigma
}

/// Coulomb-like push away from unbonded neighbors whose partial charge has the same sign.
fn charge_repulsion(
    ctx: &StepContext,
    i: usize,
    position: &[Vec3],
    species: &[SpeciesId],
    charge: &[f32],
    is_bonded: impl Fn(usize) -> bool,
) -> Vec3 {
    let config = ctx.config;
    let q = charge[i];
    if q == 0.0 || config.electrostatic_constant == 0.0 || config.electrostatic_range == 0.0 {
        return Vec3::ZERO;
    }
    let own = ctx.species(species[i]);
    let mut impulse = Vec3::ZERO;

    ctx.grid
        .for_each_neighbor(position, i, config.electrostatic_range, |j| {
            if q * charge[j] <= 0.0 || is_bonded(j) {
                return;
            }
            let delta = position[i] - position[j];
            let distance = delta.length();
            if distance < MIN_DISTANCE {
                return;
            }
            // Closer than contact, the collision response takes over.
            let contact = own.radius + ctx.species(species[j]).radius;
            let r = distance.max(contact);
            let magnitude = (config.electrostatic_constant * q * charge[j] / (r * r))
                .min(config.max_force);
            impulse += delta / distance * magnitude;
        });

    impulse * config.dt * own.inv_mass
}
