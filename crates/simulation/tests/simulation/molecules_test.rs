// Tests for derived bond-graph state: partial charges and molecule labels.

use crate::support::{simulation, species, test_config};
use glam::Vec3;
use valence_simulation::BondOrder;

#[test]
fn water_like_molecule_carries_polar_charges() {
    let mut sim = simulation(test_config());
    let (h, o) = (species(&sim, "H"), species(&sim, "O"));
    let oxygen = sim.spawn(o, Vec3::ZERO, Vec3::ZERO).unwrap();
    let h1 = sim.spawn(h, Vec3::new(1.1, 0.3, 0.0), Vec3::ZERO).unwrap();
    let h2 = sim.spawn(h, Vec3::new(-1.1, 0.3, 0.0), Vec3::ZERO).unwrap();
    sim.bond(oxygen, h1, BondOrder::Single).unwrap();
    sim.bond(oxygen, h2, BondOrder::Single).unwrap();

    let charges = sim.charges();
    assert!(charges[oxygen] < 0.0);
    assert!(charges[h1] > 0.0);
    assert!((charges[h1] - charges[h2]).abs() < 1e-6);
    assert!((charges[oxygen] + charges[h1] + charges[h2]).abs() < 1e-5);

    let table = sim.species_table();
    let expected = sim.config().charge_transfer
        * (table[o].electronegativity - table[h].electronegativity);
    assert!((charges[h1] - expected).abs() < 1e-5);
}

#[test]
fn unbonded_and_same_species_bonds_stay_neutral() {
    let mut sim = simulation(test_config());
    let c = species(&sim, "C");
    let a = sim.spawn(c, Vec3::ZERO, Vec3::ZERO).unwrap();
    let b = sim.spawn(c, Vec3::new(1.4, 0.0, 0.0), Vec3::ZERO).unwrap();
    let lone = sim.spawn(c, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    sim.bond(a, b, BondOrder::Single).unwrap();
    sim.step();

    for i in [a, b, lone] {
        assert_eq!(sim.charges()[i], 0.0);
    }
}

#[test]
fn molecules_are_labelled_by_their_lowest_index() {
    let mut sim = simulation(test_config());
    let (c, h) = (species(&sim, "C"), species(&sim, "H"));
    let lone = sim.spawn(c, Vec3::new(-20.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    let h1 = sim.spawn(h, Vec3::new(8.8, 0.0, 0.0), Vec3::ZERO).unwrap();
    let c1 = sim.spawn(c, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO).unwrap();
    let c2 = sim.spawn(c, Vec3::new(11.4, 0.0, 0.0), Vec3::ZERO).unwrap();
    let h2 = sim.spawn(h, Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO).unwrap();
    let c3 = sim.spawn(c, Vec3::new(1.2, 10.0, 0.0), Vec3::ZERO).unwrap();
    sim.bond(c2, c1, BondOrder::Single).unwrap();
    sim.bond(c1, h1, BondOrder::Single).unwrap();
    sim.bond(c3, h2, BondOrder::Single).unwrap();

    let labels = sim.molecule_labels();
    assert_eq!(labels[lone], lone as u32);
    for i in [h1, c1, c2] {
        assert_eq!(labels[i], h1 as u32);
    }
    assert_eq!(labels[h2], h2 as u32);
    assert_eq!(labels[c3], h2 as u32);
    assert_eq!(sim.molecule_count(), 2);
    assert_eq!(sim.particle(c2).unwrap().molecule, h1 as u32);

    // Splitting a molecule relabels both halves.
    sim.remove(c1).unwrap();
    let labels = sim.molecule_labels();
    assert_eq!(labels[h1], h1 as u32);
    assert_eq!(labels[c2], c2 as u32);
    assert_eq!(sim.molecule_count(), 1);
    assert_eq!(sim.charges()[h1], 0.0);
}
