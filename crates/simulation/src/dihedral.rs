// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Torsional solver for bonded chains A-B-C-D.
//
// The torsion angle of a chain is the angle between the A-B-C and B-C-D planes, seen along the
// B-C bond. Every chain is pushed toward the anti-periplanar arrangement (180°), which gives
// saturated chains their zig-zag shape. The ends move perpendicular to their planes and each
// inner atom takes the reaction of the end bonded to it. Like the angular solver this runs in
// gather form, over a velocity snapshot.

use crate::context::StepContext;
use crate::forces::MIN_DISTANCE;
use crate::particle::BondList;
use glam::Vec3;
use std::f32::consts::PI;

/// Planes spanned by nearly collinear bonds have no defined normal.
const PLANE_EPSILON: f32 = 1e-3;

/// Signed torsion angle of the chain `a-b-c-d`, in `(-PI, PI]`, or `None` when either plane is
/// degenerate. Zero is the eclipsed arrangement.
pub fn torsion_angle(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> Option<f32> {
    Torsion::new(a, b, c, d).map(|t| t.angle)
}

struct Torsion {
    angle: f32,
    /// Unit normal of the a-b-c plane.
    m: Vec3,
    /// Unit normal of the b-c-d plane.
    n: Vec3,
    /// Distances of `a` and `d` from the b-c axis.
    arm_a: f32,
    arm_d: f32,
}

impl Torsion {
    fn new(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> Option<Self> {
        let (b1, b2, b3) = (b - a, c - b, d - c);
        let axis = b2.length();
        if axis < MIN_DISTANCE {
            return None;
        }
        let (m, n) = (b1.cross(b2), b2.cross(b3));
        let (lm, ln) = (m.length(), n.length());
        if lm < PLANE_EPSILON * b1.length() * axis || ln < PLANE_EPSILON * b3.length() * axis {
            return None;
        }
        let (m, n) = (m / lm, n / ln);
        Some(Self {
            angle: (axis * b1.dot(n) / lm).atan2(m.dot(n)),
            m,
            n,
            arm_a: lm / axis,
            arm_d: ln / axis,
        })
    }
}

/// Impulses on the ends `a` and `d` of the chain `a-b-c-d`, or `None` when the chain is within
/// tolerance of anti-periplanar or degenerate.
fn chain_impulse(
    ctx: &StepContext,
    [a, b, c, d]: [usize; 4],
    position: &[Vec3],
    velocity: &[Vec3],
) -> Option<(Vec3, Vec3)> {
    // A chain and its reverse describe the same torsion; evaluate it in one orientation only.
    if c < b {
        return chain_impulse(ctx, [d, c, b, a], position, velocity)
            .map(|(on_d, on_a)| (on_a, on_d));
    }
    let config = ctx.config;
    if config.dihedral_stiffness == 0.0 && config.dihedral_damping == 0.0 {
        return None;
    }
    let torsion = Torsion::new(position[a], position[b], position[c], position[d])?;

    let deviation = PI - torsion.angle.abs();
    if deviation <= config.angle_tolerance_degrees.to_radians() {
        return None;
    }
    // Directions that rotate each end away from the eclipsed arrangement.
    let sign = if torsion.angle < 0.0 { -1.0 } else { 1.0 };
    let (open_a, open_d) = (-sign * torsion.m, sign * torsion.n);

    let opening_rate = (velocity[a] - velocity[b]).dot(open_a) / torsion.arm_a
        + (velocity[d] - velocity[c]).dot(open_d) / torsion.arm_d;
    let magnitude = (config.dihedral_stiffness * deviation
        - config.dihedral_damping * opening_rate)
        .clamp(-config.max_force, config.max_force);

    let impulse = magnitude * config.dt;
    Some((open_a * impulse, open_d * impulse))
}

/// Sum of the torsional impulses particle `i` receives, before dividing by its mass.
pub(crate) fn impulse(
    ctx: &StepContext,
    i: usize,
    position: &[Vec3],
    bonds: &[BondList],
    velocity: &[Vec3],
) -> Vec3 {
    let partners = |k: usize| bonds[k].iter().map(|&j| j as usize);
    let mut total = Vec3::ZERO;

    for j in partners(i) {
        // As the end of a chain i-j-k-l.
        for k in partners(j).filter(|&k| k != i) {
            for l in partners(k).filter(|&l| l != j && l != i) {
                if let Some((on_end, _)) = chain_impulse(ctx, [i, j, k, l], position, velocity) {
                    total += on_end;
                }
            }
        }
        // As the inner atom of a chain k-i-j-l, taking the reaction of end k.
        for k in partners(i).filter(|&k| k != j) {
            for l in partners(j).filter(|&l| l != i && l != k) {
                if let Some((on_end, _)) = chain_impulse(ctx, [k, i, j, l], position, velocity) {
                    total -= on_end;
                }
            }
        }
    }
    total
}
