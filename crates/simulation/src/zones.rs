// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Energy zones: spherical regions that shift the local temperature (vents, cold spots) or scale
// the bonding probability (catalytic surfaces).

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneKind {
    /// Adds `temperature_boost` at the center, falling off linearly to zero at the radius.
    /// Negative boosts describe cold regions.
    Thermal { temperature_boost: f32 },
    /// Multiplies the bonding acceptance probability of pairs inside the radius.
    Catalytic { bond_boost: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub center: Vec3,
    pub radius: f32,
    #[serde(flatten)]
    pub kind: ZoneKind,
}

impl Zone {
    pub fn thermal(center: Vec3, radius: f32, temperature_boost: f32) -> Self {
        Self {
            center,
            radius,
            kind: ZoneKind::Thermal { temperature_boost },
        }
    }

    pub fn catalytic(center: Vec3, radius: f32, bond_boost: f32) -> Self {
        Self {
            center,
            radius,
            kind: ZoneKind::Catalytic { bond_boost },
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.center.is_finite() {
            return Err("center must be finite".to_string());
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(format!("radius must be positive (got {})", self.radius));
        }
        match self.kind {
            ZoneKind::Thermal { temperature_boost } if !temperature_boost.is_finite() => {
                Err("temperature_boost must be finite".to_string())
            }
            ZoneKind::Catalytic { bond_boost }
                if !(bond_boost.is_finite() && bond_boost >= 0.0) =>
            {
                Err(format!("bond_boost must not be negative (got {bond_boost})"))
            }
            _ => Ok(()),
        }
    }

    /// Linear falloff weight: 1 at the center, 0 at and beyond the radius.
    #[inline]
    fn weight(&self, position: Vec3) -> f32 {
        (1.0 - position.distance(self.center) / self.radius).max(0.0)
    }
}

/// Summed temperature offset of every thermal zone at `position`.
pub fn temperature_boost(zones: &[Zone], position: Vec3) -> f32 {
    zones
        .iter()
        .filter_map(|zone| match zone.kind {
            ZoneKind::Thermal { temperature_boost } => {
                Some(temperature_boost * zone.weight(position))
            }
            ZoneKind::Catalytic { .. } => None,
        })
        .sum()
}

/// Local temperature at `position`, never below zero.
pub fn local_temperature(ambient: f32, zones: &[Zone], position: Vec3) -> f32 {
    (ambient + temperature_boost(zones, position)).max(0.0)
}

/// Product of the bond boosts of every catalytic zone containing `position`.
pub fn catalytic_factor(zones: &[Zone], position: Vec3) -> f32 {
    zones
        .iter()
        .filter_map(|zone| match zone.kind {
            ZoneKind::Catalytic { bond_boost }
                if position.distance_squared(zone.center) <= zone.radius * zone.radius =>
            {
                Some(bond_boost)
            }
            _ => None,
        })
        .product()
}
