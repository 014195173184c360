// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! # Species table
//!
//! Immutable per-species data consumed by the simulation kernels: mass, valence capacity, base
//! radius, electronegativity and display color, plus the symmetric species × species affinity
//! matrix. A [`SpeciesTable`] is built once, either from loosely-typed [`SpeciesRecord`]s (whose
//! on-disk format is somebody else's problem) or from the built-in [`SpeciesTable::standard`]
//! set, and every record is validated before the table exists. Kernels can therefore index it
//! without defensive checks.

mod affinity;
mod error;
mod table;

pub use affinity::AffinityMatrix;
pub use error::SpeciesError;
pub use table::{Species, SpeciesId, SpeciesRecord, SpeciesTable, MAX_VALENCE};

/// The chemical elements the built-in species table knows about.
///
/// Species do not have to correspond to an element; a species created from a record without a
/// matching symbol simply has no element attached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Element {
    Hydrogen = 1,
    Carbon = 6,
    Nitrogen = 7,
    Oxygen = 8,
    Sodium = 11,
    Silicon = 14,
    Phosphorus = 15,
    Sulfur = 16,
    Chlorine = 17,
}

impl Element {
    pub const ALL: [Element; 9] = [
        Element::Hydrogen,
        Element::Carbon,
        Element::Nitrogen,
        Element::Oxygen,
        Element::Sodium,
        Element::Silicon,
        Element::Phosphorus,
        Element::Sulfur,
        Element::Chlorine,
    ];

    pub fn from_atomic_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|e| *e as u8 == n)
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.symbol() == symbol)
    }

    pub fn atomic_number(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Element::Hydrogen => "H",
            Element::Carbon => "C",
            Element::Nitrogen => "N",
            Element::Oxygen => "O",
            Element::Sodium => "Na",
            Element::Silicon => "Si",
            Element::Phosphorus => "P",
            Element::Sulfur => "S",
            Element::Chlorine => "Cl",
        }
    }
}
