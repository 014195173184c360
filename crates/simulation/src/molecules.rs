// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Derived bond-graph state, refreshed after every bonding commit: partial charges from
// electronegativity differences, and molecule labels from connected components.

use crate::bond::BondTable;
use crate::particle::Particles;
use periodic_table::SpeciesTable;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;

/// Sets each particle's partial charge to `charge_transfer * Σ (χ_partner - χ_self)` over its
/// bonds. The more electronegative endpoint of a polar bond ends up negative.
pub(crate) fn update_charges(
    table: &SpeciesTable,
    charge_transfer: f32,
    particles: &mut Particles,
) {
    let Particles {
        charge,
        species,
        bonds,
        active,
        ..
    } = particles;
    let (species, bonds, active) = (&*species, &*bonds, &*active);

    charge.par_iter_mut().enumerate().for_each(|(i, q)| {
        if !active[i] {
            *q = 0.0;
            return;
        }
        let own = table[species[i]].electronegativity;
        *q = charge_transfer
            * bonds[i]
                .iter()
                .map(|&j| table[species[j as usize]].electronegativity - own)
                .sum::<f32>();
    });
}

/// Labels every active particle with the lowest index in its bonded component and returns the
/// number of components with two or more members.
pub(crate) fn label(particles: &mut Particles, bonds: &BondTable) -> usize {
    let slots = particles.slots();
    let mut components = UnionFind::<u32>::new(slots);
    for bond in bonds {
        components.union(bond.a, bond.b);
    }
    let roots = components.into_labeling();

    let mut lowest = vec![u32::MAX; slots];
    let mut size = vec![0u32; slots];
    for i in 0..slots {
        if !particles.active[i] {
            continue;
        }
        let root = roots[i] as usize;
        if lowest[root] == u32::MAX {
            lowest[root] = i as u32;
        }
        size[root] += 1;
        particles.molecule[i] = lowest[root];
    }

    size.iter().filter(|&&n| n >= 2).count()
}
