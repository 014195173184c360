// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! # Valence simulation core
//!
//! A data-parallel particle simulation in which atoms attract, collide, bond and break apart,
//! producing emergent molecular structures. Every step runs the same fixed sequence of stages,
//! each a parallel pass over the particles separated from the next by a barrier:
//!
//! 1. queued configuration and spawn/removal/pulse requests are applied;
//! 2. the [`SpatialGrid`] is rebuilt;
//! 3. pre-step forces (affinity attraction, soft repulsion, gravity) are accumulated;
//! 4. collisions and bond springs are resolved over a fixed number of iterations;
//! 5. velocities and positions are integrated;
//! 6. post-step terms (thermal jitter, partial-charge repulsion, chain torsion) and the angular
//!    geometry solver adjust velocities;
//! 7. bonds break and form, under each species' valence capacity;
//! 8. partial charges and molecule labels are refreshed.
//!
//! Rendering consumes the state through [`Simulation::compact`], which packs the particles and
//! bonds inside a view rectangle into plain-old-data records.
//!
//! All randomness is drawn from streams keyed by the configured seed, the step number and the
//! entity, so a run is reproducible regardless of the number of worker threads.

mod angular;
mod bond;
mod bonding;
mod compaction;
mod config;
mod context;
mod counters;
mod dihedral;
mod error;
mod forces;
mod grid;
mod integrate;
mod molecules;
mod particle;
mod requests;
mod rng;
mod simulation;
mod zones;

pub use angular::{ideal_angle, TETRAHEDRAL_ANGLE};
pub use bond::{Bond, BondOrder, BondTable, DOUBLE_BOND_REST_SCALE, DOUBLE_BOND_STIFFNESS_SCALE};
pub use bonding::{acceptance_probability, bond_geometry, bonding_distance};
pub use compaction::{FrameStats, RenderBond, RenderFrame, RenderParticle, ViewRect};
pub use config::{BondingConfig, BondingCurve, SimulationConfig};
pub use counters::{Counters, EventCounts};
pub use dihedral::torsion_angle;
pub use error::{Result, SimulationError};
pub use forces::{ForcePipeline, PostStepForce, PreStepForce};
pub use grid::SpatialGrid;
pub use particle::BondList;
pub use requests::Request;
pub use simulation::{ParticleView, Simulation};
pub use zones::{catalytic_factor, local_temperature, temperature_boost, Zone, ZoneKind};

pub use periodic_table::{SpeciesError, SpeciesId, SpeciesRecord, SpeciesTable};

/// A module which is typically glob imported.
pub mod prelude {
    pub use super::{
        BondOrder, ForcePipeline, RenderFrame, Simulation, SimulationConfig, SimulationError,
        SpeciesId, ViewRect, Zone,
    };
}
