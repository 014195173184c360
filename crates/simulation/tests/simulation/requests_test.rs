// Tests for the request queue: validation at enqueue time, atomic application at the step
// boundary, slot reuse and the full-buffer policy.

use crate::support::{simulation, species, test_config};
use glam::Vec3;
use valence_simulation::{BondOrder, Request, SimulationConfig, SimulationError, SpeciesId};

#[test]
fn invalid_requests_are_rejected_when_queued() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();

    assert!(matches!(
        sim.queue_spawn(SpeciesId(200), Vec3::ZERO, Vec3::ZERO),
        Err(SimulationError::UnknownSpecies(SpeciesId(200)))
    ));
    assert!(matches!(
        sim.queue_spawn(c, Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ZERO),
        Err(SimulationError::InvalidRequest(_))
    ));
    assert!(matches!(
        sim.queue_removal(5),
        Err(SimulationError::ParticleOutOfRange { index: 5, len: 1 })
    ));
    assert!(matches!(
        sim.queue_pulse(Vec3::ZERO, 0.0, 1.0),
        Err(SimulationError::InvalidRequest(_))
    ));
    assert!(sim.pending_requests().is_empty());

    sim.remove(0).unwrap();
    assert!(matches!(
        sim.queue_removal(0),
        Err(SimulationError::ParticleInactive(0))
    ));
}

#[test]
fn queued_requests_apply_at_the_next_step() {
    let mut sim = simulation(test_config());
    let (c, o) = (species(&sim, "C"), species(&sim, "O"));
    let first = sim.spawn(c, Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO).unwrap();

    sim.queue_spawn(o, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.queue_spawn(o, Vec3::new(10.0, 5.0, 0.0), Vec3::ZERO).unwrap();
    sim.queue_removal(first).unwrap();
    assert_eq!(sim.pending_requests().len(), 3);
    assert_eq!(
        sim.pending_requests()[2],
        Request::Remove { index: first }
    );
    assert_eq!(sim.particle_count(), 1);
    assert!(sim.is_active(first));

    sim.step();
    assert!(sim.pending_requests().is_empty());
    assert_eq!(sim.particle_count(), 2);
    assert!(!sim.is_active(first));
    let last = sim.counters().last_step;
    assert_eq!(last.particles_spawned, 2);
    assert_eq!(last.particles_removed, 1);
}

#[test]
fn freed_slots_are_reused_before_new_ones() {
    let mut sim = simulation(test_config());
    let (c, n) = (species(&sim, "C"), species(&sim, "N"));
    for k in 0..3 {
        sim.spawn(c, Vec3::new(k as f32 * 5.0, 0.0, 0.0), Vec3::ZERO)
            .unwrap();
    }
    sim.queue_removal(1).unwrap();
    sim.step();
    assert_eq!(sim.active_indices().collect::<Vec<_>>(), vec![0, 2]);

    sim.queue_spawn(n, Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO).unwrap();
    sim.step();
    assert_eq!(sim.active_indices().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(sim.slots(), 3);
    let reused = sim.particle(1).unwrap();
    assert_eq!(reused.species, n);
    assert!(reused.bonds.is_empty());
    assert_eq!(reused.valence_used, 0);
}

#[test]
fn immediate_removal_cancels_a_queued_removal_of_the_same_slot() {
    let mut sim = simulation(test_config());
    let (c, o) = (species(&sim, "C"), species(&sim, "O"));
    let old = sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    let kept = sim.spawn(c, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.queue_removal(old).unwrap();
    sim.queue_removal(kept).unwrap();

    sim.remove(old).unwrap();
    assert_eq!(sim.pending_requests(), &[Request::Remove { index: kept }]);

    let fresh = sim.spawn(o, Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    assert_eq!(fresh, old);
    sim.step();

    assert!(sim.is_active(fresh));
    assert_eq!(sim.particle(fresh).unwrap().species, o);
    assert!(!sim.is_active(kept));
    assert_eq!(sim.counters().last_step.particles_removed, 1);
}

#[test]
fn spawns_beyond_capacity_are_dropped_and_counted() {
    let config = SimulationConfig {
        max_particles: 2,
        ..test_config()
    };
    let mut sim = simulation(config);
    let c = species(&sim, "C");
    sim.spawn(c, Vec3::new(-5.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.queue_spawn(c, Vec3::new(0.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.queue_spawn(c, Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.step();

    assert_eq!(sim.particle_count(), 2);
    assert_eq!(sim.counters().last_step.spawns_rejected, 1);
    assert_eq!(sim.counters().total.spawns_rejected, 1);
    assert!(matches!(
        sim.spawn(c, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO),
        Err(SimulationError::CapacityExceeded(2))
    ));
}

#[test]
fn removal_breaks_every_bond_of_the_particle() {
    let mut sim = simulation(test_config());
    let (c, h) = (species(&sim, "C"), species(&sim, "H"));
    let center = sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    let arms: Vec<usize> = [Vec3::X, Vec3::Y, -Vec3::X]
        .iter()
        .map(|&d| sim.spawn(h, d * 1.2, Vec3::ZERO).unwrap())
        .collect();
    for &arm in &arms {
        sim.bond(center, arm, BondOrder::Single).unwrap();
    }

    sim.queue_removal(center).unwrap();
    sim.step();

    assert!(sim.bonds().is_empty());
    assert_eq!(sim.counters().last_step.bonds_broken, 3);
    for &arm in &arms {
        let view = sim.particle(arm).unwrap();
        assert!(view.bonds.is_empty());
        assert_eq!(view.valence_used, 0);
    }
}

#[test]
fn duplicate_removals_in_one_batch_count_once() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let index = sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    sim.queue_removal(index).unwrap();
    sim.queue_removal(index).unwrap();
    sim.step();

    assert_eq!(sim.particle_count(), 0);
    assert_eq!(sim.counters().last_step.particles_removed, 1);
}

#[test]
fn pulse_pushes_particles_away_from_its_center() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let near = sim.spawn(c, Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    let other = sim.spawn(c, Vec3::new(0.0, -1.5, 0.0), Vec3::ZERO).unwrap();
    let far = sim.spawn(c, Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO).unwrap();

    sim.queue_pulse(Vec3::ZERO, 4.0, 60.0).unwrap();
    sim.step();

    assert!(sim.velocities()[near].x > 0.0);
    assert!(sim.velocities()[other].y < 0.0);
    assert_eq!(sim.velocities()[far], Vec3::ZERO);
}

#[test]
fn spawns_outside_the_world_are_clamped() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let max = sim.config().world_max;
    let index = sim.spawn(c, Vec3::splat(1000.0), Vec3::ZERO).unwrap();
    assert_eq!(sim.positions()[index], max);
}
