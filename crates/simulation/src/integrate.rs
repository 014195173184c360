// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Constraint resolution and semi-implicit Euler integration.
//
// Resolution runs a fixed number of Jacobi iterations. Each iteration snapshots all velocities,
// lets every particle compute the impulse it receives from collisions and bond springs against
// that snapshot, then commits all impulses at once. Impulses between a pair are equal and
// opposite, and every iteration contributes `dt / N` worth of spring force, so the total per step
// does not depend on the iteration count.

use crate::bond::BondTable;
use crate::context::StepContext;
use crate::forces::MIN_DISTANCE;
use crate::particle::Particles;
use glam::Vec3;
use rayon::prelude::*;

pub(crate) fn resolve_constraints(ctx: &StepContext, particles: &mut Particles, bonds: &BondTable) {
    let iterations = ctx.config.resolution_iterations.max(1);
    let mut snapshot = particles.velocity.clone();

    for _ in 0..iterations {
        snapshot.copy_from_slice(&particles.velocity);
        let Particles {
            velocity,
            position,
            species,
            bonds: partners,
            active,
            ..
        } = &mut *particles;
        let (position, species, partners, active, snapshot) =
            (&*position, &*species, &*partners, &*active, &snapshot[..]);

        velocity.par_iter_mut().enumerate().for_each(|(i, v)| {
            if !active[i] {
                return;
            }
            let config = ctx.config;
            let dt = config.dt;
            let fraction = 1.0 / iterations as f32;
            let own = ctx.species(species[i]);
            let predicted = position[i] + snapshot[i] * dt;
            let mut dv = Vec3::ZERO;

            // Hard collisions: remove a fraction of the predicted overlap, split by inverse mass.
            let reach = own.radius + ctx.table.max_radius() + 2.0 * config.max_speed * dt;
            ctx.grid.for_each_neighbor(position, i, reach, |j| {
                let other = ctx.species(species[j]);
                let contact = own.radius + other.radius;
                let delta = (position[j] + snapshot[j] * dt) - predicted;
                let distance = delta.length();
                if distance >= contact {
                    return;
                }
                let normal = if distance > MIN_DISTANCE {
                    delta / distance
                } else if i < j {
                    Vec3::X
                } else {
                    -Vec3::X
                };
                let share = own.inv_mass / (own.inv_mass + other.inv_mass);
                dv -= normal
                    * ((contact - distance) * config.collision_stiffness * share * fraction / dt);
            });

            // Bond springs with damping along the bond axis.
            for &j in &partners[i] {
                let j = j as usize;
                let Some(bond) = bonds.get(i as u32, j as u32) else {
                    debug_assert!(false, "partner list out of sync with bond table");
                    continue;
                };
                let delta = (position[j] + snapshot[j] * dt) - predicted;
                let distance = delta.length();
                if distance < MIN_DISTANCE {
                    continue;
                }
                let axis = delta / distance;
                let closing_speed = (snapshot[j] - snapshot[i]).dot(axis);
                let magnitude = (bond.stiffness * (distance - bond.rest_length)
                    + config.spring_damping * closing_speed)
                    .clamp(-config.max_force, config.max_force);
                dv += axis * (magnitude * own.inv_mass * dt * fraction);
            }

            *v += dv;
        });
    }
}

/// Semi-implicit Euler: velocity from the clamped force, drag, speed clamp, then position, then
/// the world walls. Non-finite values are reset rather than propagated; the number of resets is
/// returned.
pub(crate) fn integrate(ctx: &StepContext, particles: &mut Particles) -> usize {
    let config = ctx.config;
    let dt = config.dt;
    let drag = (1.0 - config.drag * dt).max(0.0);
    let Particles {
        position,
        velocity,
        force,
        species,
        active,
        ..
    } = particles;
    let (force, species, active) = (&*force, &*species, &*active);

    position
        .par_iter_mut()
        .zip(velocity.par_iter_mut())
        .enumerate()
        .map(|(i, (p, v))| {
            if !active[i] {
                return 0;
            }
            let mut resets = 0;

            let mut f = force[i];
            if !f.is_finite() {
                f = Vec3::ZERO;
                resets += 1;
            }
            let f = f.clamp_length_max(config.max_force);

            *v += f * (ctx.species(species[i]).inv_mass * dt);
            *v *= drag;
            if !v.is_finite() {
                *v = Vec3::ZERO;
                resets += 1;
            }
            *v = v.clamp_length_max(config.max_speed);

            let next = *p + *v * dt;
            if next.is_finite() {
                *p = next;
            } else {
                *v = Vec3::ZERO;
                resets += 1;
            }

            for axis in 0..3 {
                if p[axis] < config.world_min[axis] {
                    p[axis] = config.world_min[axis];
                    v[axis] = v[axis].max(0.0);
                } else if p[axis] > config.world_max[axis] {
                    p[axis] = config.world_max[axis];
                    v[axis] = v[axis].min(0.0);
                }
            }

            resets
        })
        .sum()
}
