// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use periodic_table::{SpeciesError, SpeciesId};
use thiserror::Error;

/// Errors reported synchronously by the simulation's external surface.
///
/// Nothing inside a step returns an error: capacity overflow and numeric trouble are degraded
/// gracefully and counted instead.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown species {0:?}")]
    UnknownSpecies(SpeciesId),

    #[error("particle index {index} is out of range ({len} slots)")]
    ParticleOutOfRange { index: usize, len: usize },

    #[error("particle {0} is not active")]
    ParticleInactive(usize),

    #[error("cannot bond {a} and {b}: {reason}")]
    InvalidBond {
        a: usize,
        b: usize,
        reason: &'static str,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("particle buffer is full ({0} particles)")]
    CapacityExceeded(usize),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Species(#[from] SpeciesError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
