// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Bonding state machine.
//
// Runs once per step on settled positions. Breaking is evaluated first, over all bonds in
// parallel, and committed sequentially. Formation candidates are then gathered in parallel,
// one list per lower-index particle, and committed in ascending (i, j) order. Committing updates
// each particle's valence counter immediately, so the counter doubles as the per-step claim:
// once a particle is full, later candidates involving it are rejected.

use crate::bond::{
    Bond, BondOrder, BondTable, DOUBLE_BOND_REST_SCALE, DOUBLE_BOND_STIFFNESS_SCALE,
};
use crate::config::{BondingConfig, SimulationConfig};
use crate::context::StepContext;
use crate::particle::Particles;
use crate::rng::{self, Stream};
use crate::zones;
use log::trace;
use periodic_table::{SpeciesId, SpeciesTable};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BondingOutcome {
    pub formed: usize,
    pub broken: usize,
}

/// Distance below which two species may bond.
pub fn bonding_distance(
    config: &BondingConfig,
    table: &SpeciesTable,
    a: SpeciesId,
    b: SpeciesId,
) -> f32 {
    config.range_factor * (table[a].radius + table[b].radius)
}

/// Rest length and spring stiffness of a new bond between two species.
pub fn bond_geometry(
    config: &SimulationConfig,
    table: &SpeciesTable,
    a: SpeciesId,
    b: SpeciesId,
    order: BondOrder,
) -> (f32, f32) {
    let rest = config.bonding.rest_length_factor * (table[a].radius + table[b].radius);
    match order {
        BondOrder::Single => (rest, config.spring_stiffness),
        BondOrder::Double => (
            rest * DOUBLE_BOND_REST_SCALE,
            config.spring_stiffness * DOUBLE_BOND_STIFFNESS_SCALE,
        ),
    }
}

/// Probability that an in-range pair bonds this step.
///
/// Pairs at or above the affinity threshold always bond. Below it the probability is
/// `base_probability * affinity * curve(distance / bonding_distance)`, scaled by the catalytic
/// factor and capped at one. Zero affinity never bonds.
pub fn acceptance_probability(
    config: &BondingConfig,
    affinity: f32,
    distance: f32,
    bonding_distance: f32,
    catalytic_factor: f32,
) -> f32 {
    if affinity <= 0.0 || distance >= bonding_distance {
        return 0.0;
    }
    if affinity >= config.affinity_threshold {
        return 1.0;
    }
    let x = distance / bonding_distance;
    (config.base_probability * affinity * config.curve.eval(x) * catalytic_factor).clamp(0.0, 1.0)
}

/// Adds a bond and updates both endpoints. Returns `false` if the pair is already bonded.
pub(crate) fn attach(particles: &mut Particles, bonds: &mut BondTable, bond: Bond) -> bool {
    let (a, b, slots) = (bond.a as usize, bond.b as usize, bond.order.slots());
    if !bonds.insert(bond) {
        return false;
    }
    particles.bonds[a].push(b as u32);
    particles.bonds[b].push(a as u32);
    particles.valence_used[a] += slots;
    particles.valence_used[b] += slots;
    true
}

/// Removes the bond between `a` and `b`, if any, and updates both endpoints.
pub(crate) fn detach(
    particles: &mut Particles,
    bonds: &mut BondTable,
    a: u32,
    b: u32,
) -> Option<Bond> {
    let bond = bonds.remove(a, b)?;
    let slots = bond.order.slots();
    for (from, to) in [(bond.a, bond.b), (bond.b, bond.a)] {
        let list = &mut particles.bonds[from as usize];
        if let Some(pos) = list.iter().position(|&p| p == to) {
            list.swap_remove(pos);
        }
        let used = &mut particles.valence_used[from as usize];
        *used = used.saturating_sub(slots);
    }
    Some(bond)
}

pub(crate) fn update(
    ctx: &StepContext,
    particles: &mut Particles,
    bonds: &mut BondTable,
) -> BondingOutcome {
    let broken = break_bonds(ctx, particles, bonds);
    let formed = form_bonds(ctx, particles, bonds);
    if broken > 0 || formed > 0 {
        trace!("step {}: {} bonds formed, {} broken", ctx.step, formed, broken);
    }
    BondingOutcome { formed, broken }
}

/// New strain counter for `bond` and whether it breaks this step.
fn evaluate_bond(ctx: &StepContext, particles: &Particles, bond: &Bond) -> (u32, bool) {
    let config = ctx.config;
    let bonding = &config.bonding;
    let (a, b) = (bond.a as usize, bond.b as usize);
    let (pa, pb) = (particles.position[a], particles.position[b]);

    let ratio = pa.distance(pb) / bond.rest_length;
    if !ratio.is_finite() || ratio > bonding.snap_ratio {
        return (0, true);
    }

    let strained = if ratio > bonding.tension_ratio {
        bond.strained_steps + 1
    } else {
        0
    };
    if strained >= bonding.tension_sustain_steps {
        return (strained, true);
    }

    if bonding.thermal_break_rate > 0.0 {
        let temperature =
            zones::local_temperature(config.temperature, &config.zones, (pa + pb) * 0.5);
        if temperature > 0.0 {
            let connectivity = (particles.bonds[a].len() + particles.bonds[b].len()) as f32;
            let probability = bonding.thermal_break_rate
                * config.boltzmann
                * temperature
                * config.dt
                * (1.0 + bonding.connectivity_weight * connectivity);
            let key = rng::pair_key(bond.a, bond.b);
            let draw = rng::uniform(config.seed, ctx.step, Stream::BondBreak, key);
            if draw < probability.min(1.0) {
                return (strained, true);
            }
        }
    }

    (strained, false)
}

fn break_bonds(ctx: &StepContext, particles: &mut Particles, bonds: &mut BondTable) -> usize {
    let decisions: Vec<(u32, bool)> = {
        let particles = &*particles;
        bonds
            .as_slice()
            .par_iter()
            .map(|bond| evaluate_bond(ctx, particles, bond))
            .collect()
    };

    let mut doomed = Vec::new();
    for (bond, (strained, breaks)) in bonds.as_mut_slice().iter_mut().zip(decisions) {
        bond.strained_steps = strained;
        if breaks {
            doomed.push((bond.a, bond.b));
        }
    }
    doomed.sort_unstable();

    for &(a, b) in &doomed {
        detach(particles, bonds, a, b);
    }
    doomed.len()
}

/// Accepted partners `j > i` of particle `i`, in ascending order.
fn candidates_for(
    ctx: &StepContext,
    particles: &Particles,
    bonds: &BondTable,
    i: usize,
) -> Vec<(u32, u32)> {
    let config = ctx.config;
    let table = ctx.table;
    if !particles.active[i] {
        return Vec::new();
    }
    let species_i = particles.species[i];
    if particles.valence_used[i] >= table[species_i].valence {
        return Vec::new();
    }

    let position = &particles.position;
    let reach = config.bonding.range_factor * (table[species_i].radius + table.max_radius());
    let mut accepted = Vec::new();

    ctx.grid.for_each_neighbor(position, i, reach, |j| {
        if j <= i || !particles.active[j] {
            return;
        }
        let species_j = particles.species[j];
        if particles.valence_used[j] >= table[species_j].valence
            || bonds.contains(i as u32, j as u32)
        {
            return;
        }
        let distance = position[i].distance(position[j]);
        let limit = bonding_distance(&config.bonding, table, species_i, species_j);
        let affinity = table.affinity(species_i, species_j);
        let midpoint = (position[i] + position[j]) * 0.5;
        let probability = acceptance_probability(
            &config.bonding,
            affinity,
            distance,
            limit,
            zones::catalytic_factor(&config.zones, midpoint),
        );
        if probability <= 0.0 {
            return;
        }
        let key = rng::pair_key(i as u32, j as u32);
        if probability >= 1.0
            || rng::uniform(config.seed, ctx.step, Stream::BondForm, key) < probability
        {
            accepted.push((i as u32, j as u32));
        }
    });

    accepted.sort_unstable();
    accepted
}

fn form_bonds(ctx: &StepContext, particles: &mut Particles, bonds: &mut BondTable) -> usize {
    let candidates: Vec<(u32, u32)> = {
        let (particles, bonds) = (&*particles, &*bonds);
        (0..particles.slots())
            .into_par_iter()
            .flat_map_iter(|i| candidates_for(ctx, particles, bonds, i))
            .collect()
    };

    let table = ctx.table;
    let mut formed = 0;
    for (i, j) in candidates {
        let (a, b) = (i as usize, j as usize);
        let (species_a, species_b) = (particles.species[a], particles.species[b]);
        let slots = BondOrder::Single.slots();
        if particles.valence_used[a] + slots > table[species_a].valence
            || particles.valence_used[b] + slots > table[species_b].valence
        {
            continue;
        }
        let (rest_length, stiffness) =
            bond_geometry(ctx.config, table, species_a, species_b, BondOrder::Single);
        if attach(
            particles,
            bonds,
            Bond::new(i, j, rest_length, stiffness, ctx.step, BondOrder::Single),
        ) {
            formed += 1;
        }
    }
    formed
}
