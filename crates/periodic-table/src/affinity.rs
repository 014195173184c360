// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use crate::SpeciesId;

/// Symmetric species × species coefficient matrix.
///
/// Values are stored densely in row-major order. Every write goes to both `(a, b)` and `(b, a)`,
/// so symmetry holds by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityMatrix {
    len: usize,
    values: Vec<f32>,
}

impl AffinityMatrix {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            values: vec![0.0; len * len],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, a: SpeciesId, b: SpeciesId) -> f32 {
        self.values[a.index() * self.len + b.index()]
    }

    pub(crate) fn set(&mut self, a: SpeciesId, b: SpeciesId, value: f32) {
        self.values[a.index() * self.len + b.index()] = value;
        self.values[b.index() * self.len + a.index()] = value;
    }
}
