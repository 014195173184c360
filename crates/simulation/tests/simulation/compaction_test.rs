// Tests for view culling and compaction against a brute-force filter of the particle store.

use crate::support::{scatter, simulation, species, test_config};
use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use valence_simulation::{BondOrder, RenderFrame, Simulation, ViewRect};

fn populated() -> Simulation {
    let mut sim = simulation(test_config());
    scatter(&mut sim, &["H", "C", "O", "N"], 500, Vec3::new(38.0, 23.0, 1.8), 31);
    sim.run(20);
    for index in (0..sim.slots()).step_by(9) {
        sim.remove(index).unwrap();
    }
    sim
}

fn assert_frame_matches(sim: &Simulation, view: &ViewRect, frame: &RenderFrame) {
    let margin = sim.config().cull_margin;
    let table = sim.species_table();
    let visible: Vec<usize> = sim
        .active_indices()
        .filter(|&i| view.contains(sim.positions()[i], margin))
        .collect();

    let indices: Vec<usize> = frame.particles.iter().map(|p| p.index as usize).collect();
    assert_eq!(indices, visible);
    for record in &frame.particles {
        let i = record.index as usize;
        let species = &table[sim.species_ids()[i]];
        assert_eq!(record.position, sim.positions()[i].to_array());
        assert_eq!(record.radius, species.radius);
        assert_eq!(record.color, species.color);
    }

    let is_visible = |i: u32| visible.binary_search(&(i as usize)).is_ok();
    let mut expected: Vec<(u32, u32)> = sim
        .bonds()
        .iter()
        .filter(|bond| is_visible(bond.a) || is_visible(bond.b))
        .map(|bond| (bond.a, bond.b))
        .collect();
    expected.sort_unstable();
    let bonds: Vec<(u32, u32)> = frame
        .bonds
        .iter()
        .map(|bond| (bond.start_index, bond.end_index))
        .collect();
    assert_eq!(bonds, expected);
    for bond in &frame.bonds {
        assert_eq!(bond.start, sim.positions()[bond.start_index as usize].to_array());
        assert_eq!(bond.end, sim.positions()[bond.end_index as usize].to_array());
    }

    assert_eq!(frame.stats.visible_particles, visible.len());
    assert_eq!(frame.stats.visible_bonds, expected.len());
    assert_eq!(frame.stats.active_particles, sim.particle_count());
    assert_eq!(frame.stats.active_bonds, sim.bonds().len());
    assert_eq!(frame.stats.culled, sim.particle_count() - visible.len());
}

#[test]
fn compaction_matches_brute_force_for_random_views() {
    let mut sim = populated();
    assert!(!sim.bonds().is_empty());
    let mut rng = SmallRng::seed_from_u64(4);
    let mut frame = RenderFrame::default();

    for _ in 0..25 {
        let min = Vec2::new(rng.gen_range(-45.0..30.0), rng.gen_range(-30.0..20.0));
        let size = Vec2::new(rng.gen_range(0.5..40.0), rng.gen_range(0.5..30.0));
        let view = ViewRect::new(min, min + size);
        sim.compact_into(&view, &mut frame);
        assert_frame_matches(&sim, &view, &frame);
        assert_eq!(sim.counters().particles_culled, frame.stats.culled as u64);
    }
}

#[test]
fn view_covering_the_world_shows_every_active_particle() {
    let mut sim = populated();
    let (min, max) = (sim.config().world_min, sim.config().world_max);
    let view = ViewRect::new(min.truncate(), max.truncate());
    let frame = sim.compact(&view);

    assert_frame_matches(&sim, &view, &frame);
    assert_eq!(frame.particles.len(), sim.particle_count());
    assert_eq!(frame.bonds.len(), sim.bonds().len());
    assert_eq!(frame.stats.culled, 0);
    assert_eq!(frame.as_particle_bytes().len(), 32 * frame.particles.len());
    assert_eq!(frame.as_bond_bytes().len(), 32 * frame.bonds.len());
}

#[test]
fn margin_keeps_particles_just_outside_the_view() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let margin = sim.config().cull_margin;
    let inside = sim.spawn(c, Vec3::new(9.0, 5.0, 0.0), Vec3::ZERO).unwrap();
    let near = sim
        .spawn(c, Vec3::new(10.0 + 0.5 * margin, 5.0, 0.0), Vec3::ZERO)
        .unwrap();
    sim.spawn(c, Vec3::new(10.0 + 2.0 * margin, 5.0, 0.0), Vec3::ZERO)
        .unwrap();

    let view = ViewRect::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0));
    let frame = sim.compact(&view);
    let indices: Vec<u32> = frame.particles.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![inside as u32, near as u32]);
    assert_eq!(frame.stats.culled, 1);
}

#[test]
fn bond_crossing_the_view_edge_is_kept() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let a = sim.spawn(c, Vec3::new(9.5, 0.0, 0.0), Vec3::ZERO).unwrap();
    let b = sim.spawn(c, Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.bond(a, b, BondOrder::Single).unwrap();

    let view = ViewRect::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0));
    let frame = sim.compact(&view);
    assert_eq!(frame.particles.len(), 1);
    assert_eq!(frame.bonds.len(), 1);
    assert_eq!(frame.bonds[0].start_index, a as u32);
    assert_eq!(frame.bonds[0].end_index, b as u32);
}
