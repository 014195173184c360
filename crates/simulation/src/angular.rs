// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Angular geometry solver.
//
// For every center with two or more bonds, each unordered pair of bonded neighbors is pushed
// toward the ideal angle for the center's bond count. The corrective impulse acts on both
// neighbors, perpendicular to their bond vectors in the plane of the pair, and the center takes
// the opposite reaction. The solver is written in gather form: every particle sums the impulses
// it receives, as a neighbor of each of its centers and as a center itself, so the parallel pass
// writes only its own velocity.

use crate::context::StepContext;
use crate::forces::MIN_DISTANCE;
use crate::particle::Particles;
use glam::Vec3;
use rayon::prelude::*;

/// Ideal angle of a center with four bonds, `acos(-1/3)`.
pub const TETRAHEDRAL_ANGLE: f32 = 1.910_633_2;

/// Flatness threshold for the out-of-plane symmetry breaking.
const PLANAR_EPSILON: f32 = 1e-3;

const COLLINEAR_EPSILON: f32 = 1e-8;

/// The ideal angle for a center with `bond_count` bonds, and whether it only pushes apart.
///
/// Beyond four bonds no single angle describes every pair, so only pairs closer than 90° are
/// corrected.
pub fn ideal_angle(bond_count: usize) -> Option<(f32, bool)> {
    match bond_count {
        0 | 1 => None,
        2 => Some((std::f32::consts::PI, false)),
        3 => Some((120f32.to_radians(), false)),
        4 => Some((TETRAHEDRAL_ANGLE, false)),
        _ => Some((std::f32::consts::FRAC_PI_2, true)),
    }
}

/// Impulses on neighbors `j1` and `j2` of `center`, or `None` when the pair is within tolerance
/// or degenerate.
fn pair_impulse(
    ctx: &StepContext,
    center: usize,
    j1: usize,
    j2: usize,
    bond_count: usize,
    position: &[Vec3],
    velocity: &[Vec3],
) -> Option<(Vec3, Vec3)> {
    // Evaluate in a fixed order so both the center and each neighbor compute identical values.
    if j2 < j1 {
        return pair_impulse(ctx, center, j2, j1, bond_count, position, velocity)
            .map(|(a, b)| (b, a));
    }
    let config = ctx.config;
    let (ideal, one_sided) = ideal_angle(bond_count)?;

    let d1 = position[j1] - position[center];
    let d2 = position[j2] - position[center];
    let (l1, l2) = (d1.length(), d2.length());
    if l1 < MIN_DISTANCE || l2 < MIN_DISTANCE {
        return None;
    }
    let (u1, u2) = (d1 / l1, d2 / l2);
    let cos = u1.dot(u2).clamp(-1.0, 1.0);
    let deviation = ideal - cos.acos();

    let tolerance = config.angle_tolerance_degrees.to_radians();
    if deviation.abs() <= tolerance || (one_sided && deviation < 0.0) {
        return None;
    }

    // Directions that open the angle. Collinear pairs have no defined bending plane.
    let (perp1, perp2) = (u2 - u1 * cos, u1 - u2 * cos);
    if perp1.length_squared() < COLLINEAR_EPSILON || perp2.length_squared() < COLLINEAR_EPSILON {
        return None;
    }
    let (open1, open2) = (-perp1.normalize(), -perp2.normalize());

    let opening_rate = (velocity[j1] - velocity[center]).dot(open1) / l1
        + (velocity[j2] - velocity[center]).dot(open2) / l2;
    let magnitude = (config.angular_stiffness * deviation - config.angular_damping * opening_rate)
        .clamp(-config.max_force, config.max_force);

    let impulse = magnitude * config.dt;
    Some((open1 * impulse, open2 * impulse))
}

pub(crate) fn solve(ctx: &StepContext, particles: &mut Particles) {
    let snapshot = particles.velocity.clone();
    let Particles {
        velocity,
        position,
        species,
        bonds,
        active,
        ..
    } = particles;
    let (position, species, bonds, active) = (&*position, &*species, &*bonds, &*active);
    let config = ctx.config;

    velocity.par_iter_mut().enumerate().for_each(|(i, v)| {
        if !active[i] || bonds[i].is_empty() {
            return;
        }
        let mut impulse = Vec3::ZERO;

        // As a neighbor of each of its centers.
        for &center in &bonds[i] {
            let center = center as usize;
            let around = &bonds[center];
            if around.len() < 2 {
                continue;
            }
            for &other in around {
                let other = other as usize;
                if other == i {
                    continue;
                }
                if let Some((received, _)) =
                    pair_impulse(ctx, center, i, other, around.len(), position, &snapshot)
                {
                    impulse += received;
                }
            }
        }

        // As a center: the reaction to every pair of its own neighbors.
        let own = &bonds[i];
        for (a, &j1) in own.iter().enumerate() {
            for &j2 in &own[a + 1..] {
                if let Some((on1, on2)) = pair_impulse(
                    ctx,
                    i,
                    j1 as usize,
                    j2 as usize,
                    own.len(),
                    position,
                    &snapshot,
                ) {
                    impulse -= on1 + on2;
                }
            }
        }

        *v += impulse * ctx.species(species[i]).inv_mass;

        // A flat arrangement is an equilibrium of the pair forces even when the ideal geometry
        // is not flat, so nudge such centers out of the z plane.
        if own.len() >= 4 && config.symmetry_breaking > 0.0 && snapshot[i].z.abs() < PLANAR_EPSILON
        {
            let z = position[i].z;
            let flat = own
                .iter()
                .all(|&j| (position[j as usize].z - z).abs() < PLANAR_EPSILON);
            if flat {
                v.z += if i % 2 == 0 {
                    config.symmetry_breaking
                } else {
                    -config.symmetry_breaking
                };
            }
        }
    });
}
