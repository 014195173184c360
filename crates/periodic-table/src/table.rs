// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use crate::{AffinityMatrix, Element, SpeciesError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::Index;

/// Upper bound on any species' valence capacity. Per-particle bond lists are sized for this.
pub const MAX_VALENCE: u8 = 8;

/// Radii below are van der Waals radii relative to hydrogen; this maps them to world units.
const VDW_SCALE: f32 = 0.85 * 0.5;

/// Dense index of a species inside a [`SpeciesTable`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SpeciesId(pub u8);

impl SpeciesId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One loosely-typed species definition, as handed over by whatever loads species definitions.
///
/// Affinities are keyed by the other species' symbol. A pair may be given on either side or on
/// both; when both sides are present they must agree.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesRecord {
    pub symbol: String,
    pub mass: f32,
    pub valence: u8,
    pub radius: f32,
    #[serde(default = "default_electronegativity")]
    pub electronegativity: f32,
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default)]
    pub affinities: BTreeMap<String, f32>,
}

fn default_electronegativity() -> f32 {
    2.0
}

fn default_color() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

/// Validated per-species data.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub symbol: String,
    pub element: Option<Element>,
    pub mass: f32,
    pub inv_mass: f32,
    /// Valence capacity: the maximum number of bond slots this species can fill at once.
    pub valence: u8,
    pub radius: f32,
    pub electronegativity: f32,
    pub color: [f32; 3],
}

/// Immutable lookup table of species and their pairwise affinities.
#[derive(Debug, Clone)]
pub struct SpeciesTable {
    species: Vec<Species>,
    affinity: AffinityMatrix,
    max_radius: f32,
}

impl SpeciesTable {
    /// Validates `records` and builds a table. Species ids are assigned in record order.
    pub fn from_records(records: Vec<SpeciesRecord>) -> Result<Self, SpeciesError> {
        validate(&records)?;
        Ok(Self::from_validated(records))
    }

    /// The built-in species set: the light elements that make up most prebiotic chemistry, with
    /// Pauling electronegativities and hand-tuned affinities.
    pub fn standard() -> Self {
        Self::from_validated(standard_records())
    }

    fn from_validated(records: Vec<SpeciesRecord>) -> Self {
        let ids: HashMap<String, SpeciesId> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.symbol.clone(), SpeciesId(i as u8)))
            .collect();

        let mut affinity = AffinityMatrix::new(records.len());
        for (i, record) in records.iter().enumerate() {
            for (other, &value) in &record.affinities {
                affinity.set(SpeciesId(i as u8), ids[other], value);
            }
        }

        let species: Vec<Species> = records
            .into_iter()
            .map(|r| Species {
                element: Element::from_symbol(&r.symbol),
                symbol: r.symbol,
                mass: r.mass,
                inv_mass: 1.0 / r.mass,
                valence: r.valence,
                radius: r.radius,
                electronegativity: r.electronegativity,
                color: r.color,
            })
            .collect();
        let max_radius = species.iter().map(|s| s.radius).fold(0.0, f32::max);

        Self {
            species,
            affinity,
            max_radius,
        }
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn contains(&self, id: SpeciesId) -> bool {
        id.index() < self.species.len()
    }

    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id.index())
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<SpeciesId> {
        self.species
            .iter()
            .position(|s| s.symbol == symbol)
            .map(|i| SpeciesId(i as u8))
    }

    #[inline]
    pub fn affinity(&self, a: SpeciesId, b: SpeciesId) -> f32 {
        self.affinity.get(a, b)
    }

    pub fn affinities(&self) -> &AffinityMatrix {
        &self.affinity
    }

    /// Largest base radius of any species.
    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.species
            .iter()
            .enumerate()
            .map(|(i, s)| (SpeciesId(i as u8), s))
    }
}

impl Index<SpeciesId> for SpeciesTable {
    type Output = Species;

    fn index(&self, id: SpeciesId) -> &Species {
        &self.species[id.index()]
    }
}

fn validate(records: &[SpeciesRecord]) -> Result<(), SpeciesError> {
    if records.is_empty() {
        return Err(SpeciesError::Empty);
    }
    if records.len() > u8::MAX as usize {
        return Err(SpeciesError::TooMany(records.len()));
    }

    let mut symbols: HashMap<&str, usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        if record.symbol.trim().is_empty() {
            return Err(SpeciesError::EmptySymbol(i));
        }
        if symbols.insert(record.symbol.as_str(), i).is_some() {
            return Err(SpeciesError::DuplicateSymbol(record.symbol.clone()));
        }

        let invalid = |field: &'static str, value: f32| SpeciesError::InvalidField {
            symbol: record.symbol.clone(),
            field,
            value,
        };
        if !record.mass.is_finite() || record.mass <= 0.0 {
            return Err(invalid("mass", record.mass));
        }
        if !record.radius.is_finite() || record.radius <= 0.0 {
            return Err(invalid("radius", record.radius));
        }
        if !record.electronegativity.is_finite() || record.electronegativity < 0.0 {
            return Err(invalid("electronegativity", record.electronegativity));
        }
        if let Some(&c) = record
            .color
            .iter()
            .find(|c| !c.is_finite() || !(0.0..=1.0).contains(*c))
        {
            return Err(invalid("color", c));
        }
        if record.valence == 0 || record.valence > MAX_VALENCE {
            return Err(SpeciesError::ValenceOutOfRange {
                symbol: record.symbol.clone(),
                valence: record.valence,
                max: MAX_VALENCE,
            });
        }
    }

    for record in records {
        for (other, &value) in &record.affinities {
            let Some(&j) = symbols.get(other.as_str()) else {
                return Err(SpeciesError::UnknownAffinityTarget {
                    symbol: record.symbol.clone(),
                    other: other.clone(),
                });
            };
            if !value.is_finite() || value < 0.0 {
                return Err(SpeciesError::InvalidField {
                    symbol: record.symbol.clone(),
                    field: "affinity",
                    value,
                });
            }
            if let Some(&back) = records[j].affinities.get(&record.symbol) {
                if (back - value).abs() > 1e-6 {
                    return Err(SpeciesError::AsymmetricAffinity {
                        a: record.symbol.clone(),
                        b: other.clone(),
                        ab: value,
                        ba: back,
                    });
                }
            }
        }
    }

    Ok(())
}

fn standard_records() -> Vec<SpeciesRecord> {
    // (symbol, mass, valence, relative vdW radius, electronegativity, color)
    #[rustfmt::skip]
    let base: [(&str, f32, u8, f32, f32, [f32; 3]); 9] = [
        ("H",  1.008,  1, 1.0,    2.20, [1.0, 1.0, 1.0]),          // white
        ("C",  12.011, 4, 1.4167, 2.55, [0.30196, 0.2902, 0.3098]), // dark grey
        ("N",  14.007, 3, 1.292,  3.04, [0.2078, 0.4549, 0.6118]),  // blue
        ("O",  15.999, 2, 1.267,  3.44, [0.7490, 0.2118, 0.3176]),  // red
        ("P",  30.974, 3, 1.625,  2.19, [0.7019, 0.4314, 0.1451]),  // orange
        ("S",  32.06,  2, 1.5,    2.58, [0.7294, 0.5804, 0.1686]),  // yellow
        ("Si", 28.085, 4, 1.75,   1.90, [0.7294, 0.5804, 0.1686]),  // yellow
        ("Na", 22.990, 1, 1.9,    0.93, [0.6706, 0.3608, 0.9490]),  // violet
        ("Cl", 35.45,  1, 1.45,   3.16, [0.1216, 0.9412, 0.1216]),  // green
    ];

    #[rustfmt::skip]
    let pairs: [(&str, &str, f32); 20] = [
        ("H", "H", 0.6), ("H", "C", 1.0), ("H", "N", 1.0), ("H", "O", 1.2),
        ("H", "S", 0.7), ("H", "Cl", 0.8), ("H", "P", 0.5),
        ("C", "C", 0.9), ("C", "N", 0.8), ("C", "O", 0.8), ("C", "S", 0.6),
        ("C", "Cl", 0.6), ("C", "Si", 0.6),
        ("N", "N", 0.3), ("N", "Si", 0.6), ("O", "O", 0.2), ("O", "P", 0.9),
        ("O", "Si", 1.0), ("O", "S", 0.5), ("Na", "Cl", 1.5),
    ];

    let mut records: Vec<SpeciesRecord> = base
        .iter()
        .map(
            |&(symbol, mass, valence, radius, electronegativity, color)| SpeciesRecord {
                symbol: symbol.to_string(),
                mass,
                valence,
                radius: radius * VDW_SCALE,
                electronegativity,
                color,
                affinities: BTreeMap::new(),
            },
        )
        .collect();

    for (a, b, value) in pairs {
        if let Some(record) = records.iter_mut().find(|r| r.symbol == a) {
            record.affinities.insert(b.to_string(), value);
        }
    }

    records
}
