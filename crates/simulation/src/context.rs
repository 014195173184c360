// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use crate::config::SimulationConfig;
use crate::grid::SpatialGrid;
use periodic_table::{Species, SpeciesId, SpeciesTable};

/// Read-only inputs shared by every kernel of one step.
#[derive(Clone, Copy)]
pub(crate) struct StepContext<'a> {
    pub config: &'a SimulationConfig,
    pub table: &'a SpeciesTable,
    pub grid: &'a SpatialGrid,
    pub step: u64,
}

impl StepContext<'_> {
    #[inline]
    pub fn species(&self, id: SpeciesId) -> &Species {
        &self.table[id]
    }
}
