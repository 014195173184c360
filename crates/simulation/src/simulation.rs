// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use crate::bond::{Bond, BondOrder, BondTable};
use crate::bonding;
use crate::compaction::{self, RenderFrame, ViewRect};
use crate::config::SimulationConfig;
use crate::context::StepContext;
use crate::counters::{Counters, EventCounts};
use crate::forces::ForcePipeline;
use crate::grid::SpatialGrid;
use crate::particle::Particles;
use crate::requests::{self, Request};
use crate::{angular, integrate, molecules};
use crate::{Result, SimulationError};
use glam::Vec3;
use log::{debug, info, warn};
use periodic_table::{SpeciesId, SpeciesRecord, SpeciesTable};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// A read-only view of one active particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView<'a> {
    pub index: usize,
    pub species: SpeciesId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub charge: f32,
    /// Lowest particle index in this particle's molecule.
    pub molecule: u32,
    /// Indices of bonded partners.
    pub bonds: &'a [u32],
    /// Valence slots in use (double bonds count twice).
    pub valence_used: u8,
}

struct PendingConfig {
    config: SimulationConfig,
    pool: Option<Arc<ThreadPool>>,
}

/// The complete simulation state.
///
/// Everything a step touches is owned here and handed to each stage as an explicit borrow.
/// Between steps, callers may read state, queue requests and swap the configuration; queued
/// changes are applied atomically at the start of the next [`Simulation::step`].
pub struct Simulation {
    table: SpeciesTable,
    config: SimulationConfig,
    pending: Option<PendingConfig>,
    pipeline: ForcePipeline,
    particles: Particles,
    bonds: BondTable,
    grid: SpatialGrid,
    requests: Vec<Request>,
    counters: Counters,
    molecule_count: usize,
    pool: Arc<ThreadPool>,
}

fn build_pool(threads: usize) -> Result<Arc<ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("valence-worker-{i}"))
        .build()?;
    Ok(Arc::new(pool))
}

impl Simulation {
    pub fn new(table: SpeciesTable, config: SimulationConfig) -> Result<Self> {
        Self::with_pipeline(table, config, ForcePipeline::default())
    }

    /// Validates raw species records and builds a simulation over the resulting table.
    pub fn from_records(records: Vec<SpeciesRecord>, config: SimulationConfig) -> Result<Self> {
        Self::new(SpeciesTable::from_records(records)?, config)
    }

    pub fn with_pipeline(
        table: SpeciesTable,
        config: SimulationConfig,
        pipeline: ForcePipeline,
    ) -> Result<Self> {
        config.validate()?;
        let pool = build_pool(config.worker_threads)?;
        let grid = SpatialGrid::new(&config);
        info!(
            "simulation ready: {} species, {} particle slots, {:?} grid cells of {}, {} workers",
            table.len(),
            config.max_particles,
            grid.dims(),
            config.cell_size,
            pool.current_num_threads()
        );

        Ok(Self {
            particles: Particles::with_capacity(config.max_particles),
            bonds: BondTable::default(),
            grid,
            table,
            config,
            pending: None,
            pipeline,
            requests: Vec::new(),
            counters: Counters::default(),
            molecule_count: 0,
            pool,
        })
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Validates `config` and schedules it to take effect at the start of the next step.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate()?;
        if config.max_particles < self.particles.slots() {
            return Err(SimulationError::InvalidConfig(format!(
                "max_particles ({}) is below the {} slots already in use",
                config.max_particles,
                self.particles.slots()
            )));
        }
        let pool = if config.worker_threads != self.config.worker_threads {
            Some(build_pool(config.worker_threads)?)
        } else {
            None
        };
        self.pending = Some(PendingConfig { config, pool });
        Ok(())
    }

    /// The configuration the current step runs with. A pending replacement is not visible yet.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn apply_pending_config(&mut self) {
        let Some(PendingConfig { config, pool }) = self.pending.take() else {
            return;
        };
        let regrid = config.world_min != self.config.world_min
            || config.world_max != self.config.world_max
            || config.cell_size != self.config.cell_size
            || config.max_per_cell != self.config.max_per_cell;
        if regrid {
            self.grid = SpatialGrid::new(&config);
        }
        if config.max_particles != self.particles.capacity() {
            self.particles.set_capacity(config.max_particles);
        }
        if let Some(pool) = pool {
            self.pool = pool;
        }
        self.config = config;
        info!("configuration replaced at step {}", self.counters.step);
    }

    // ========================================================================
    // Immediate edits, for building the initial world between steps
    // ========================================================================

    /// Creates a particle right away and returns its index.
    pub fn spawn(&mut self, species: SpeciesId, position: Vec3, velocity: Vec3) -> Result<usize> {
        self.validate_spawn(species, position, velocity)?;
        let position = position.clamp(self.config.world_min, self.config.world_max);
        let index = self
            .particles
            .insert(species, position, velocity)
            .ok_or(SimulationError::CapacityExceeded(self.particles.capacity()))?;
        self.counters.total.particles_spawned += 1;
        Ok(index)
    }

    /// Removes a particle right away, breaking its bonds. Queued removals of the same slot are
    /// dropped, since the slot may be reused before the next step.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.check_active(index)?;
        self.requests
            .retain(|request| !matches!(request, Request::Remove { index: i } if *i == index));
        let broken = self.remove_particle(index);
        self.counters.total.bonds_broken += broken;
        self.counters.total.particles_removed += 1;
        self.refresh_derived();
        Ok(())
    }

    /// Bonds two particles right away, bypassing the probabilistic state machine but not the
    /// valence limits.
    pub fn bond(&mut self, a: usize, b: usize, order: BondOrder) -> Result<()> {
        self.check_active(a)?;
        self.check_active(b)?;
        let invalid = |reason| SimulationError::InvalidBond { a, b, reason };
        if a == b {
            return Err(invalid("a particle cannot bond to itself"));
        }
        if self.bonds.contains(a as u32, b as u32) {
            return Err(invalid("already bonded"));
        }
        let (species_a, species_b) = (self.particles.species[a], self.particles.species[b]);
        for (index, species) in [(a, species_a), (b, species_b)] {
            if self.particles.valence_used[index] + order.slots() > self.table[species].valence {
                return Err(invalid("valence capacity exceeded"));
            }
        }

        let (rest_length, stiffness) =
            bonding::bond_geometry(&self.config, &self.table, species_a, species_b, order);
        let bond = Bond::new(
            a as u32,
            b as u32,
            rest_length,
            stiffness,
            self.counters.step,
            order,
        );
        bonding::attach(&mut self.particles, &mut self.bonds, bond);
        self.counters.total.bonds_formed += 1;
        self.refresh_derived();
        Ok(())
    }

    pub fn set_position(&mut self, index: usize, position: Vec3) -> Result<()> {
        self.check_active(index)?;
        if !position.is_finite() {
            return Err(SimulationError::InvalidRequest(format!(
                "position {position} is not finite"
            )));
        }
        self.particles.position[index] =
            position.clamp(self.config.world_min, self.config.world_max);
        Ok(())
    }

    pub fn set_velocity(&mut self, index: usize, velocity: Vec3) -> Result<()> {
        self.check_active(index)?;
        if !velocity.is_finite() {
            return Err(SimulationError::InvalidRequest(format!(
                "velocity {velocity} is not finite"
            )));
        }
        self.particles.velocity[index] = velocity;
        Ok(())
    }

    // ========================================================================
    // Request queue
    // ========================================================================

    /// Queues a particle for creation at the next step boundary.
    ///
    /// If the particle buffer is full by then, the spawn is dropped with a warning and counted in
    /// [`crate::EventCounts::spawns_rejected`].
    pub fn queue_spawn(
        &mut self,
        species: SpeciesId,
        position: Vec3,
        velocity: Vec3,
    ) -> Result<()> {
        self.validate_spawn(species, position, velocity)?;
        self.requests.push(Request::Spawn {
            species,
            position,
            velocity,
        });
        Ok(())
    }

    /// Queues an active particle for removal at the next step boundary.
    pub fn queue_removal(&mut self, index: usize) -> Result<()> {
        self.check_active(index)?;
        self.requests.push(Request::Remove { index });
        Ok(())
    }

    /// Queues a radial velocity pulse around `center` for the next step boundary.
    pub fn queue_pulse(&mut self, center: Vec3, radius: f32, strength: f32) -> Result<()> {
        if !center.is_finite() || !strength.is_finite() || !(radius.is_finite() && radius > 0.0) {
            return Err(SimulationError::InvalidRequest(format!(
                "pulse at {center} with radius {radius} and strength {strength}"
            )));
        }
        self.requests.push(Request::Pulse {
            center,
            radius,
            strength,
        });
        Ok(())
    }

    pub fn pending_requests(&self) -> &[Request] {
        &self.requests
    }

    fn validate_spawn(&self, species: SpeciesId, position: Vec3, velocity: Vec3) -> Result<()> {
        if !self.table.contains(species) {
            return Err(SimulationError::UnknownSpecies(species));
        }
        if !position.is_finite() || !velocity.is_finite() {
            return Err(SimulationError::InvalidRequest(format!(
                "spawn at {position} with velocity {velocity} is not finite"
            )));
        }
        Ok(())
    }

    fn check_active(&self, index: usize) -> Result<()> {
        if index >= self.particles.slots() {
            return Err(SimulationError::ParticleOutOfRange {
                index,
                len: self.particles.slots(),
            });
        }
        if !self.particles.is_active(index) {
            return Err(SimulationError::ParticleInactive(index));
        }
        Ok(())
    }

    /// Breaks every bond of `index` and frees its slot. Returns the number of bonds broken.
    fn remove_particle(&mut self, index: usize) -> u64 {
        let partners = self.particles.bonds[index].clone();
        for partner in &partners {
            bonding::detach(&mut self.particles, &mut self.bonds, index as u32, *partner);
        }
        self.particles.remove(index);
        partners.len() as u64
    }

    fn apply_requests(&mut self, events: &mut EventCounts) {
        if self.requests.is_empty() {
            return;
        }
        for request in std::mem::take(&mut self.requests) {
            match request {
                Request::Spawn {
                    species,
                    position,
                    velocity,
                } => {
                    let position = position.clamp(self.config.world_min, self.config.world_max);
                    match self.particles.insert(species, position, velocity) {
                        Some(_) => events.particles_spawned += 1,
                        None => {
                            warn!(
                                "particle buffer full ({} particles); dropping spawn of {:?}",
                                self.particles.capacity(),
                                species
                            );
                            events.spawns_rejected += 1;
                        }
                    }
                }
                Request::Remove { index } => {
                    // An earlier request in the same batch may already have removed it.
                    if self.particles.is_active(index) {
                        events.bonds_broken += self.remove_particle(index);
                        events.particles_removed += 1;
                    }
                }
                Request::Pulse {
                    center,
                    radius,
                    strength,
                } => {
                    let particles = &mut self.particles;
                    requests::apply_pulse(&self.table, particles, center, radius, strength);
                }
            }
        }
        self.refresh_derived();
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Advances the simulation by one fixed time step.
    pub fn step(&mut self) {
        let mut events = EventCounts::default();
        self.apply_pending_config();
        self.apply_requests(&mut events);

        let pool = Arc::clone(&self.pool);
        pool.install(|| self.advance(&mut events));

        self.counters.record(events);
        debug!(
            "step {}: {} particles, {} bonds, {} molecules, +{} -{} bonds",
            self.counters.step,
            self.particles.active_count(),
            self.bonds.len(),
            self.molecule_count,
            events.bonds_formed,
            events.bonds_broken
        );
    }

    /// Runs `steps` steps back to back.
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    fn rebuild_grid(&mut self) -> u64 {
        let dropped = self
            .grid
            .rebuild(&self.particles.position, &self.particles.active);
        if dropped > 0 {
            warn!(
                "step {}: {} particles did not fit in their grid cell (capacity {})",
                self.counters.step,
                dropped,
                self.grid.max_per_cell()
            );
        }
        dropped as u64
    }

    fn advance(&mut self, events: &mut EventCounts) {
        let step = self.counters.step;

        // Forces, constraint resolution and integration see the grid of the old positions.
        events.grid_overflows += self.rebuild_grid();
        {
            let ctx = StepContext {
                config: &self.config,
                table: &self.table,
                grid: &self.grid,
                step,
            };
            self.pipeline.accumulate(&ctx, &mut self.particles);
            integrate::resolve_constraints(&ctx, &mut self.particles, &self.bonds);
            events.numeric_resets += integrate::integrate(&ctx, &mut self.particles) as u64;
        }

        // Everything after integration works on the moved positions.
        events.grid_overflows += self.rebuild_grid();
        let ctx = StepContext {
            config: &self.config,
            table: &self.table,
            grid: &self.grid,
            step,
        };
        self.pipeline.apply_post_step(&ctx, &mut self.particles);
        angular::solve(&ctx, &mut self.particles);

        let outcome = bonding::update(&ctx, &mut self.particles, &mut self.bonds);
        events.bonds_formed += outcome.formed as u64;
        events.bonds_broken += outcome.broken as u64;

        molecules::update_charges(&self.table, self.config.charge_transfer, &mut self.particles);
        self.molecule_count = molecules::label(&mut self.particles, &self.bonds);

        debug_assert!(self.valence_respected(), "valence capacity exceeded");
    }

    fn refresh_derived(&mut self) {
        molecules::update_charges(&self.table, self.config.charge_transfer, &mut self.particles);
        self.molecule_count = molecules::label(&mut self.particles, &self.bonds);
    }

    fn valence_respected(&self) -> bool {
        (0..self.particles.slots()).all(|i| {
            !self.particles.active[i]
                || self.particles.valence_used[i] <= self.table[self.particles.species[i]].valence
        })
    }

    // ========================================================================
    // Render output
    // ========================================================================

    /// Packs the particles inside `view` (plus the configured margin) for a renderer.
    pub fn compact(&mut self, view: &ViewRect) -> RenderFrame {
        let mut frame = RenderFrame::default();
        self.compact_into(view, &mut frame);
        frame
    }

    /// Like [`Simulation::compact`], reusing the allocations of `frame`.
    pub fn compact_into(&mut self, view: &ViewRect, frame: &mut RenderFrame) {
        let pool = Arc::clone(&self.pool);
        pool.install(|| {
            compaction::compact_into(
                &self.table,
                &self.particles,
                &self.bonds,
                view,
                self.config.cull_margin,
                frame,
            )
        });
        self.counters.particles_culled = frame.stats.culled as u64;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn species_table(&self) -> &SpeciesTable {
        &self.table
    }

    pub fn pipeline(&self) -> &ForcePipeline {
        &self.pipeline
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Number of active particles.
    pub fn particle_count(&self) -> usize {
        self.particles.active_count()
    }

    /// Number of slots handed out so far. Every per-particle array has this length.
    pub fn slots(&self) -> usize {
        self.particles.slots()
    }

    pub fn capacity(&self) -> usize {
        self.particles.capacity()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.particles.is_active(index)
    }

    pub fn particle(&self, index: usize) -> Option<ParticleView<'_>> {
        if !self.particles.is_active(index) {
            return None;
        }
        let p = &self.particles;
        Some(ParticleView {
            index,
            species: p.species[index],
            position: p.position[index],
            velocity: p.velocity[index],
            charge: p.charge[index],
            molecule: p.molecule[index],
            bonds: &p.bonds[index],
            valence_used: p.valence_used[index],
        })
    }

    /// Indices of the active particles, ascending.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.particles.slots()).filter(|&i| self.particles.active[i])
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.particles.position
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.particles.velocity
    }

    pub fn species_ids(&self) -> &[SpeciesId] {
        &self.particles.species
    }

    pub fn charges(&self) -> &[f32] {
        &self.particles.charge
    }

    pub fn molecule_labels(&self) -> &[u32] {
        &self.particles.molecule
    }

    pub fn active_flags(&self) -> &[bool] {
        &self.particles.active
    }

    pub fn bonds(&self) -> &BondTable {
        &self.bonds
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bonds.get(a as u32, b as u32)
    }

    /// Number of molecules with two or more particles.
    pub fn molecule_count(&self) -> usize {
        self.molecule_count
    }
}
