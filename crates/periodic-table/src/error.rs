// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use thiserror::Error;

/// Reasons a set of species records is rejected before a [`crate::SpeciesTable`] is built.
#[derive(Debug, Error, PartialEq)]
pub enum SpeciesError {
    #[error("species table is empty")]
    Empty,

    #[error("too many species: {0} (at most 255 are supported)")]
    TooMany(usize),

    #[error("species #{0} has an empty symbol")]
    EmptySymbol(usize),

    #[error("duplicate species symbol: {0}")]
    DuplicateSymbol(String),

    #[error("species {symbol}: invalid {field} ({value})")]
    InvalidField {
        symbol: String,
        field: &'static str,
        value: f32,
    },

    #[error("species {symbol}: valence capacity {valence} is outside 1..={max}")]
    ValenceOutOfRange { symbol: String, valence: u8, max: u8 },

    #[error("species {symbol}: affinity refers to unknown species {other}")]
    UnknownAffinityTarget { symbol: String, other: String },

    #[error("affinity between {a} and {b} is asymmetric ({ab} vs {ba})")]
    AsymmetricAffinity { a: String, b: String, ab: f32, ba: f32 },
}
