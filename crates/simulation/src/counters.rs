// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use std::ops::AddAssign;

/// Events recorded over some span of steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub bonds_formed: u64,
    pub bonds_broken: u64,
    pub particles_spawned: u64,
    pub particles_removed: u64,
    /// Spawn requests dropped because the particle buffer was full.
    pub spawns_rejected: u64,
    /// Particles left out of a full grid cell during a rebuild.
    pub grid_overflows: u64,
    /// Non-finite forces, velocities or positions reset to a safe value.
    pub numeric_resets: u64,
}

impl AddAssign for EventCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.bonds_formed += rhs.bonds_formed;
        self.bonds_broken += rhs.bonds_broken;
        self.particles_spawned += rhs.particles_spawned;
        self.particles_removed += rhs.particles_removed;
        self.spawns_rejected += rhs.spawns_rejected;
        self.grid_overflows += rhs.grid_overflows;
        self.numeric_resets += rhs.numeric_resets;
    }
}

/// Telemetry exposed after every step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Number of completed steps.
    pub step: u64,
    /// Totals since the simulation was created.
    pub total: EventCounts,
    /// Events of the most recent step, including the requests applied at its start.
    pub last_step: EventCounts,
    /// Active particles outside the view at the most recent compaction.
    pub particles_culled: u64,
}

impl Counters {
    pub(crate) fn record(&mut self, events: EventCounts) {
        self.step += 1;
        self.total += events;
        self.last_step = events;
    }
}
