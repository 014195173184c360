// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use rustc_hash::FxHashMap;

/// Rest length multiplier of a double bond relative to a single bond between the same species.
pub const DOUBLE_BOND_REST_SCALE: f32 = 0.87;
/// Spring stiffness multiplier of a double bond.
pub const DOUBLE_BOND_STIFFNESS_SCALE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
}

impl BondOrder {
    /// Valence slots the bond occupies at each endpoint.
    #[inline]
    pub fn slots(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
        }
    }
}

/// A bond between two distinct particles. `a < b` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub a: u32,
    pub b: u32,
    pub rest_length: f32,
    pub stiffness: f32,
    /// Step during which the bond formed.
    pub formed_step: u64,
    pub order: BondOrder,
    /// Consecutive steps spent beyond the tension limit.
    pub(crate) strained_steps: u32,
}

impl Bond {
    pub fn new(
        a: u32,
        b: u32,
        rest_length: f32,
        stiffness: f32,
        formed_step: u64,
        order: BondOrder,
    ) -> Self {
        let (a, b) = ordered(a, b);
        Self {
            a,
            b,
            rest_length,
            stiffness,
            formed_step,
            order,
            strained_steps: 0,
        }
    }

    /// The endpoint that is not `index`.
    #[inline]
    pub fn other(&self, index: u32) -> u32 {
        if self.a == index {
            self.b
        } else {
            self.a
        }
    }

    #[inline]
    pub fn strained_steps(&self) -> u32 {
        self.strained_steps
    }
}

#[inline]
pub(crate) fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Dense bond storage with an index keyed by the ordered endpoint pair.
#[derive(Debug, Clone, Default)]
pub struct BondTable {
    bonds: Vec<Bond>,
    index: FxHashMap<(u32, u32), usize>,
}

impl BondTable {
    #[inline]
    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Bond] {
        &self.bonds
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Bond] {
        &mut self.bonds
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bond> {
        self.bonds.iter()
    }

    #[inline]
    pub fn contains(&self, a: u32, b: u32) -> bool {
        self.index.contains_key(&ordered(a, b))
    }

    #[inline]
    pub fn get(&self, a: u32, b: u32) -> Option<&Bond> {
        self.index.get(&ordered(a, b)).map(|&i| &self.bonds[i])
    }

    /// Stores a bond. Returns `false`, leaving the table unchanged, if the pair is already bonded.
    pub(crate) fn insert(&mut self, bond: Bond) -> bool {
        debug_assert!(bond.a < bond.b, "bond endpoints must be distinct and ordered");
        let key = (bond.a, bond.b);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.bonds.len());
        self.bonds.push(bond);
        true
    }

    pub(crate) fn remove(&mut self, a: u32, b: u32) -> Option<Bond> {
        let slot = self.index.remove(&ordered(a, b))?;
        let bond = self.bonds.swap_remove(slot);
        if let Some(moved) = self.bonds.get(slot) {
            self.index.insert((moved.a, moved.b), slot);
        }
        Some(bond)
    }
}

impl<'a> IntoIterator for &'a BondTable {
    type Item = &'a Bond;
    type IntoIter = std::slice::Iter<'a, Bond>;

    fn into_iter(self) -> Self::IntoIter {
        self.bonds.iter()
    }
}
