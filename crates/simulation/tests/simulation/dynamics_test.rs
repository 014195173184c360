// Tests for the integration pipeline: momentum conservation, spring relaxation, angular geometry,
// force contributors, clamps and reproducibility across worker counts.

use crate::support::{scatter, simulation, species, test_config};
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use valence_simulation::{
    bond_geometry, torsion_angle, BondOrder, ForcePipeline, PostStepForce, PreStepForce,
    Simulation, SimulationConfig, SpeciesTable, Zone, TETRAHEDRAL_ANGLE,
};

fn momentum(sim: &Simulation) -> Vec3 {
    let table = sim.species_table();
    sim.active_indices()
        .map(|i| sim.velocities()[i] * table[sim.species_ids()[i]].mass)
        .sum()
}

fn random_direction(rng: &mut SmallRng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let length = v.length();
        if length > 0.2 && length <= 1.0 {
            return v / length;
        }
    }
}

// ============================================================================
// Conservation and relaxation
// ============================================================================

#[test]
fn isolated_bonded_pair_conserves_momentum_and_relaxes_to_rest_length() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let rest = bond_geometry(sim.config(), sim.species_table(), c, c, BondOrder::Single).0;
    let half = 0.5 * 1.15 * rest;

    let a = sim.spawn(c, Vec3::new(-half, 0.0, 0.0), Vec3::ZERO).unwrap();
    let b = sim.spawn(c, Vec3::new(half, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.bond(a, b, BondOrder::Single).unwrap();

    let mut shortest = f32::MAX;
    for _ in 0..1200 {
        sim.step();
        let (pa, pb) = (sim.positions()[a], sim.positions()[b]);
        shortest = shortest.min(pa.distance(pb));
        assert!(((pa + pb) * 0.5).length() < 1e-3, "center of mass drifted");
        assert!(momentum(&sim).length() < 1e-3, "momentum not conserved");
    }

    // Underdamped: the pair swings through the rest length before settling on it.
    assert!(shortest < rest);
    let distance = sim.positions()[a].distance(sim.positions()[b]);
    assert!((distance - rest).abs() < 0.01 * rest, "{distance} vs rest {rest}");
    assert!(sim.bond_between(a, b).is_some());
}

#[test]
fn tetrahedral_center_converges_to_ideal_angles() {
    let config = SimulationConfig {
        attraction_strength: 0.0,
        repulsion_strength: 0.0,
        electrostatic_constant: 0.0,
        drag: 1.0,
        ..test_config()
    };
    let tolerance = config.angle_tolerance_degrees;
    let mut sim = simulation(config);
    let (c, h) = (species(&sim, "C"), species(&sim, "H"));
    let rest = bond_geometry(sim.config(), sim.species_table(), c, h, BondOrder::Single).0;

    // Random directions, kept at least 45 degrees apart so no two hydrogens start overlapping.
    let mut rng = SmallRng::seed_from_u64(17);
    let mut directions: Vec<Vec3> = Vec::new();
    while directions.len() < 4 {
        let candidate = random_direction(&mut rng);
        if directions
            .iter()
            .all(|d| d.angle_between(candidate) > 45f32.to_radians())
        {
            directions.push(candidate);
        }
    }

    let center = sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    let arms: Vec<usize> = directions
        .iter()
        .map(|&d| sim.spawn(h, d * rest, Vec3::ZERO).unwrap())
        .collect();
    for &arm in &arms {
        sim.bond(center, arm, BondOrder::Single).unwrap();
    }

    sim.run(3000);

    let origin = sim.positions()[center];
    let ideal = TETRAHEDRAL_ANGLE.to_degrees();
    for (k, &a) in arms.iter().enumerate() {
        for &b in &arms[k + 1..] {
            let angle = (sim.positions()[a] - origin)
                .angle_between(sim.positions()[b] - origin)
                .to_degrees();
            assert!(
                (angle - ideal).abs() <= tolerance + 1.5,
                "angle {a}-{center}-{b} is {angle}"
            );
        }
    }
    assert_eq!(sim.particle(center).unwrap().bonds.len(), 4);
}

#[test]
fn flat_four_bond_center_leaves_the_plane() {
    let config = SimulationConfig {
        attraction_strength: 0.0,
        repulsion_strength: 0.0,
        electrostatic_constant: 0.0,
        ..test_config()
    };
    let mut sim = simulation(config);
    let (c, h) = (species(&sim, "C"), species(&sim, "H"));
    let rest = bond_geometry(sim.config(), sim.species_table(), c, h, BondOrder::Single).0;

    let center = sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    for d in [Vec3::X, Vec3::Y, -Vec3::X, -Vec3::Y] {
        let arm = sim.spawn(h, d * rest, Vec3::ZERO).unwrap();
        sim.bond(center, arm, BondOrder::Single).unwrap();
    }

    sim.step();
    assert!(sim.velocities()[center].z.abs() > 0.0);

    sim.run(600);
    let z = sim.positions()[center].z;
    let spread = sim
        .active_indices()
        .map(|i| (sim.positions()[i].z - z).abs())
        .fold(0.0, f32::max);
    assert!(spread > 0.1, "still flat: {spread}");
}

/// Spawns a bonded carbon chain with 120 degree bond angles and the given torsion, returning its
/// four indices.
fn carbon_chain(sim: &mut Simulation, torsion_degrees: f32) -> [usize; 4] {
    let c = species(sim, "C");
    let rest = bond_geometry(sim.config(), sim.species_table(), c, c, BondOrder::Single).0;
    let (sin, cos) = torsion_degrees.to_radians().sin_cos();
    let (b, c_pos) = (Vec3::new(-0.5 * rest, 0.0, 0.0), Vec3::new(0.5 * rest, 0.0, 0.0));
    let a = b + rest * Vec3::new(-0.5, 0.866, 0.0);
    let d = c_pos + rest * Vec3::new(0.5, 0.866 * cos, 0.866 * sin);

    let chain = [a, b, c_pos, d].map(|p| sim.spawn(c, p, Vec3::ZERO).unwrap());
    for pair in chain.windows(2) {
        sim.bond(pair[0], pair[1], BondOrder::Single).unwrap();
    }
    chain
}

fn chain_torsion(sim: &Simulation, [a, b, c, d]: [usize; 4]) -> f32 {
    let p = sim.positions();
    torsion_angle(p[a], p[b], p[c], p[d])
        .expect("chain is not degenerate")
        .to_degrees()
}

fn torsion_config() -> SimulationConfig {
    SimulationConfig {
        attraction_strength: 0.0,
        repulsion_strength: 0.0,
        electrostatic_constant: 0.0,
        angular_stiffness: 0.0,
        angular_damping: 0.0,
        drag: 1.0,
        ..test_config()
    }
}

#[test]
fn carbon_chain_turns_toward_anti_periplanar() {
    let mut sim = simulation(torsion_config());
    let chain = carbon_chain(&mut sim, 60.0);
    assert!((chain_torsion(&sim, chain) - 60.0).abs() < 0.5);

    sim.run(120);
    let early = chain_torsion(&sim, chain).abs();
    assert!(early > 65.0, "chain did not start turning: {early}");

    for _ in 0..20 {
        sim.run(60);
        assert!(momentum(&sim).length() < 1e-3, "momentum not conserved");
    }
    let last = chain_torsion(&sim, chain).abs();
    assert!(last > 150.0, "chain still at {last} degrees");
    assert_eq!(sim.bonds().len(), 3);
}

#[test]
fn chain_torsion_is_left_alone_without_the_dihedral_contributor() {
    let table = SpeciesTable::standard();
    let pipeline = ForcePipeline::new(
        vec![PreStepForce::AffinityPairs],
        vec![PostStepForce::ChargeRepulsion],
    );
    let mut sim = Simulation::with_pipeline(table, torsion_config(), pipeline).unwrap();
    let chain = carbon_chain(&mut sim, 60.0);
    sim.run(300);
    let torsion = chain_torsion(&sim, chain);
    assert!((torsion - 60.0).abs() < 2.0, "torsion drifted to {torsion}");
}

// ============================================================================
// Force contributors
// ============================================================================

#[test]
fn empty_pipeline_leaves_resting_particles_alone() {
    let table = SpeciesTable::standard();
    let (h, o) = (table.by_symbol("H").unwrap(), table.by_symbol("O").unwrap());
    let pipeline = ForcePipeline::new(vec![], vec![]);
    let mut sim = Simulation::with_pipeline(table, test_config(), pipeline).unwrap();

    let a = sim.spawn(o, Vec3::ZERO, Vec3::ZERO).unwrap();
    let b = sim.spawn(h, Vec3::new(2.2, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.run(10);

    assert_eq!(sim.positions()[a], Vec3::ZERO);
    assert_eq!(sim.positions()[b], Vec3::new(2.2, 0.0, 0.0));
}

#[test]
fn affinity_attraction_pulls_unbonded_neighbors_together() {
    let mut sim = simulation(test_config());
    let (h, o) = (species(&sim, "H"), species(&sim, "O"));
    let a = sim.spawn(o, Vec3::ZERO, Vec3::ZERO).unwrap();
    let b = sim.spawn(h, Vec3::new(2.2, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.step();

    assert!(sim.positions()[a].distance(sim.positions()[b]) < 2.2);
    assert!(sim.velocities()[b].x < 0.0);
    assert!(sim.velocities()[a].x > 0.0);
}

#[test]
fn gravity_only_acts_when_registered() {
    let config = SimulationConfig {
        gravity: Vec3::new(0.0, -9.81, 0.0),
        ..test_config()
    };
    let mut with_gravity = simulation(config.clone());
    let c = species(&with_gravity, "C");
    with_gravity.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    with_gravity.step();
    assert!(with_gravity.velocities()[0].y < 0.0);

    let pipeline = ForcePipeline::new(
        vec![PreStepForce::AffinityPairs],
        vec![PostStepForce::ThermalJitter],
    );
    let mut without =
        Simulation::with_pipeline(SpeciesTable::standard(), config, pipeline).unwrap();
    without.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    without.step();
    assert_eq!(without.velocities()[0], Vec3::ZERO);
}

#[test]
fn thermal_zone_agitates_only_particles_inside() {
    let config = SimulationConfig {
        zones: vec![Zone::thermal(Vec3::new(10.0, 0.0, 0.0), 5.0, 200.0)],
        ..test_config()
    };
    let mut sim = simulation(config);
    let c = species(&sim, "C");
    let hot = sim.spawn(c, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    let cold = sim.spawn(c, Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.step();

    assert_ne!(sim.velocities()[hot], Vec3::ZERO);
    assert_eq!(sim.velocities()[cold], Vec3::ZERO);
}

// ============================================================================
// Clamps
// ============================================================================

#[test]
fn speed_and_world_bounds_are_enforced() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let max = sim.config().world_max;
    let fast = sim.spawn(c, Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0)).unwrap();
    let edge = sim
        .spawn(c, Vec3::new(0.0, max.y - 0.01, 0.0), Vec3::new(0.0, 10.0, 0.0))
        .unwrap();
    sim.step();

    assert!(sim.velocities()[fast].length() <= sim.config().max_speed + 1e-3);
    assert_eq!(sim.positions()[edge].y, max.y);
    assert!(sim.velocities()[edge].y <= 0.0);

    sim.run(200);
    for i in sim.active_indices() {
        let p = sim.positions()[i];
        assert!(p.cmpge(sim.config().world_min).all() && p.cmple(max).all());
    }
    assert_eq!(sim.counters().total.numeric_resets, 0);
}

// ============================================================================
// Reproducibility
// ============================================================================

fn run_with_threads(threads: usize) -> Simulation {
    let config = SimulationConfig {
        temperature: 40.0,
        worker_threads: threads,
        ..Default::default()
    };
    let mut sim = simulation(config);
    scatter(&mut sim, &["H", "C", "N", "O"], 300, Vec3::new(15.0, 10.0, 1.5), 23);
    sim.run(60);
    sim
}

#[test]
fn results_do_not_depend_on_worker_count() {
    let serial = run_with_threads(1);
    let parallel = run_with_threads(4);

    assert_eq!(serial.positions(), parallel.positions());
    assert_eq!(serial.velocities(), parallel.velocities());
    assert_eq!(serial.bonds().as_slice(), parallel.bonds().as_slice());
    assert_eq!(serial.molecule_labels(), parallel.molecule_labels());
    assert_eq!(serial.counters(), parallel.counters());
}

#[test]
fn same_seed_same_run() {
    let first = run_with_threads(2);
    let second = run_with_threads(2);
    assert_eq!(first.positions(), second.positions());
    assert!(first.counters().total.bonds_formed > 0);
}
