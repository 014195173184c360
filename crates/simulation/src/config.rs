// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Simulation configuration: world geometry, force constants, bonding thresholds.
//
// A configuration is validated once, when it is handed to the simulation, and is then treated as
// an immutable snapshot for the duration of a step. Every field has a default, so TOML input only
// needs to name the values it changes.

use crate::zones::Zone;
use crate::{Result, SimulationError};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on `cells * max_per_cell`, so a typo in the cell size cannot allocate the machine.
const MAX_GRID_SLOTS: usize = 1 << 26;

/// Shape of the distance falloff used for probabilistic bond acceptance.
///
/// Both curves take `x = distance / bonding_distance` in `[0, 1)` and are monotonically
/// non-increasing in `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum BondingCurve {
    /// `max(0, 1 - falloff * x)`
    Linear { falloff: f32 },
    /// `exp(-falloff * x)`
    Exponential { falloff: f32 },
}

impl BondingCurve {
    #[inline]
    pub fn eval(self, x: f32) -> f32 {
        match self {
            BondingCurve::Linear { falloff } => (1.0 - falloff * x).max(0.0),
            BondingCurve::Exponential { falloff } => (-falloff * x).exp(),
        }
    }

    fn falloff(self) -> f32 {
        match self {
            BondingCurve::Linear { falloff } | BondingCurve::Exponential { falloff } => falloff,
        }
    }
}

/// Thresholds of the bonding state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BondingConfig {
    /// Pair bonding distance as a multiple of the sum of both base radii. Default: 1.6.
    pub range_factor: f32,
    /// Rest length of a newly formed single bond as a multiple of the sum of both base radii.
    /// Default: 1.2.
    pub rest_length_factor: f32,
    /// Pairs whose affinity is at or above this value bond with certainty once in range.
    pub affinity_threshold: f32,
    /// Acceptance probability scale for pairs below the affinity threshold.
    pub base_probability: f32,
    /// Distance falloff of the acceptance probability.
    pub curve: BondingCurve,
    /// A bond stretched beyond `tension_ratio * rest_length` accumulates strain.
    pub tension_ratio: f32,
    /// Consecutive strained steps after which a bond breaks.
    pub tension_sustain_steps: u32,
    /// A bond stretched beyond `snap_ratio * rest_length` breaks immediately.
    pub snap_ratio: f32,
    /// Thermal break rate per unit of thermal energy per second. Zero disables thermal breaking.
    pub thermal_break_rate: f32,
    /// Additional thermal break weight per bond attached to either endpoint.
    pub connectivity_weight: f32,
}

impl Default for BondingConfig {
    fn default() -> Self {
        Self {
            range_factor: 1.6,
            rest_length_factor: 1.2,
            affinity_threshold: 1.0,
            base_probability: 0.3,
            curve: BondingCurve::Exponential { falloff: 1.5 },
            tension_ratio: 1.8,
            tension_sustain_steps: 3,
            snap_ratio: 2.5,
            thermal_break_rate: 0.5,
            connectivity_weight: 0.1,
        }
    }
}

/// Configuration for a [`crate::Simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Lower corner of the world box. Particles are clamped inside the box.
    pub world_min: Vec3,
    /// Upper corner of the world box.
    pub world_max: Vec3,
    /// Edge length of a grid cell. Should be roughly the largest interaction radius.
    pub cell_size: f32,
    /// Maximum number of particles a grid cell holds in one step. Excess particles are left out
    /// of that cell's bucket for the step.
    pub max_per_cell: usize,
    /// Size of the particle buffer. Spawns beyond this are dropped.
    pub max_particles: usize,
    /// Fixed time slice per step, in seconds. Default: 1/60.
    pub dt: f32,
    /// Number of constraint resolution iterations per step.
    pub resolution_iterations: u32,

    /// Cutoff of the pairwise attraction/repulsion between unbonded particles.
    pub interaction_radius: f32,
    /// Scale of the affinity-weighted attraction between unbonded neighbors.
    pub attraction_strength: f32,
    /// Scale of the soft repulsion between overlapping unbonded neighbors.
    pub repulsion_strength: f32,
    /// Fraction of a collision overlap removed per step by the resolution iterations.
    pub collision_stiffness: f32,
    /// Hooke constant of a single bond.
    pub spring_stiffness: f32,
    /// Damping of the relative velocity along a bond.
    pub spring_damping: f32,
    /// Linear drag, per second.
    pub drag: f32,
    /// Uniform acceleration applied to every particle.
    pub gravity: Vec3,

    /// Stiffness pulling bond angles toward their ideal value.
    pub angular_stiffness: f32,
    /// Damping of the angular velocity of a bonded pair around their shared center.
    pub angular_damping: f32,
    /// Angle deviations at or below this value, in degrees, are left alone. Default: 5.
    pub angle_tolerance_degrees: f32,
    /// Out-of-plane velocity given to particles stuck in a flat configuration.
    pub symmetry_breaking: f32,
    /// Stiffness turning bonded chains A-B-C-D toward the anti-periplanar arrangement. The
    /// angle tolerance applies to the torsion angle as well.
    pub dihedral_stiffness: f32,
    /// Damping of the torsional velocity of a bonded chain.
    pub dihedral_damping: f32,

    /// Coulomb-like constant for same-sign partial charge repulsion. Zero disables it.
    pub electrostatic_constant: f32,
    /// Cutoff of the partial charge repulsion.
    pub electrostatic_range: f32,
    /// Partial charge per unit of electronegativity difference across a bond.
    pub charge_transfer: f32,

    /// Ambient temperature. Zero disables thermal jitter and thermal bond breaking outside of
    /// thermal zones.
    pub temperature: f32,
    /// Boltzmann-like constant converting temperature into thermal energy.
    pub boltzmann: f32,

    /// Velocities are clamped to this magnitude.
    pub max_speed: f32,
    /// Accumulated forces are clamped to this magnitude.
    pub max_force: f32,
    /// Forces below this magnitude are treated as zero.
    pub force_epsilon: f32,

    /// Margin added around the view rectangle during compaction, to avoid popping.
    pub cull_margin: f32,

    pub bonding: BondingConfig,
    pub zones: Vec<Zone>,

    /// Seed of every random stream in the simulation.
    pub seed: u64,
    /// Size of the worker pool. Zero picks the number of logical CPUs.
    pub worker_threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world_min: Vec3::new(-40.0, -25.0, -2.0),
            world_max: Vec3::new(40.0, 25.0, 2.0),
            cell_size: 2.5,
            max_per_cell: 64,
            max_particles: 8192,
            dt: 1.0 / 60.0,
            resolution_iterations: 4,
            interaction_radius: 2.5,
            attraction_strength: 2.0,
            repulsion_strength: 10.0,
            collision_stiffness: 0.5,
            spring_stiffness: 40.0,
            spring_damping: 2.0,
            drag: 0.5,
            gravity: Vec3::ZERO,
            angular_stiffness: 20.0,
            angular_damping: 4.0,
            angle_tolerance_degrees: 5.0,
            symmetry_breaking: 0.05,
            dihedral_stiffness: 4.0,
            dihedral_damping: 1.0,
            electrostatic_constant: 1.0,
            electrostatic_range: 2.5,
            charge_transfer: 0.2,
            temperature: 0.0,
            boltzmann: 0.01,
            max_speed: 20.0,
            max_force: 500.0,
            force_epsilon: 1e-6,
            cull_margin: 2.0,
            bonding: BondingConfig::default(),
            zones: Vec::new(),
            seed: 0x5eed,
            worker_threads: 0,
        }
    }
}

impl SimulationConfig {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Number of grid cells along each axis.
    pub fn grid_dims(&self) -> [usize; 3] {
        let extent = self.world_max - self.world_min;
        let dim = |e: f32| ((e / self.cell_size).ceil() as usize).max(1);
        [dim(extent.x), dim(extent.y), dim(extent.z)]
    }

    /// Rejects configurations the kernels cannot run with.
    pub fn validate(&self) -> Result<()> {
        let finite3 = |v: Vec3| v.is_finite();
        ensure(
            finite3(self.world_min) && finite3(self.world_max),
            "world bounds must be finite",
        )?;
        ensure(
            self.world_max.cmpgt(self.world_min).all(),
            format!(
                "world_max {} must exceed world_min {} on every axis",
                self.world_max, self.world_min
            ),
        )?;
        positive("cell_size", self.cell_size)?;
        ensure(self.max_per_cell > 0, "max_per_cell must be at least 1")?;
        ensure(
            self.max_particles > 0 && self.max_particles <= u32::MAX as usize,
            format!("max_particles out of range (got {})", self.max_particles),
        )?;
        let [nx, ny, nz] = self.grid_dims();
        let slots = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .and_then(|n| n.checked_mul(self.max_per_cell));
        ensure(
            slots.is_some_and(|s| s <= MAX_GRID_SLOTS),
            format!(
                "grid of {nx}x{ny}x{nz} cells with {} slots each is too large",
                self.max_per_cell
            ),
        )?;
        positive("dt", self.dt)?;
        ensure(
            self.resolution_iterations > 0,
            "resolution_iterations must be at least 1",
        )?;

        positive("interaction_radius", self.interaction_radius)?;
        ensure(
            self.interaction_radius <= self.cell_size,
            format!(
                "interaction_radius ({}) must not exceed cell_size ({})",
                self.interaction_radius, self.cell_size
            ),
        )?;
        non_negative("attraction_strength", self.attraction_strength)?;
        non_negative("repulsion_strength", self.repulsion_strength)?;
        non_negative("collision_stiffness", self.collision_stiffness)?;
        non_negative("spring_stiffness", self.spring_stiffness)?;
        non_negative("spring_damping", self.spring_damping)?;
        non_negative("drag", self.drag)?;
        ensure(finite3(self.gravity), "gravity must be finite")?;
        non_negative("angular_stiffness", self.angular_stiffness)?;
        non_negative("angular_damping", self.angular_damping)?;
        ensure(
            (0.0..90.0).contains(&self.angle_tolerance_degrees),
            format!(
                "angle_tolerance_degrees must be in [0, 90) (got {})",
                self.angle_tolerance_degrees
            ),
        )?;
        non_negative("symmetry_breaking", self.symmetry_breaking)?;
        non_negative("dihedral_stiffness", self.dihedral_stiffness)?;
        non_negative("dihedral_damping", self.dihedral_damping)?;
        non_negative("electrostatic_constant", self.electrostatic_constant)?;
        non_negative("electrostatic_range", self.electrostatic_range)?;
        non_negative("charge_transfer", self.charge_transfer)?;
        non_negative("temperature", self.temperature)?;
        non_negative("boltzmann", self.boltzmann)?;
        positive("max_speed", self.max_speed)?;
        positive("max_force", self.max_force)?;
        non_negative("force_epsilon", self.force_epsilon)?;
        non_negative("cull_margin", self.cull_margin)?;

        let b = &self.bonding;
        positive("bonding.range_factor", b.range_factor)?;
        positive("bonding.rest_length_factor", b.rest_length_factor)?;
        non_negative("bonding.affinity_threshold", b.affinity_threshold)?;
        ensure(
            (0.0..=1.0).contains(&b.base_probability),
            format!(
                "bonding.base_probability must be in [0, 1] (got {})",
                b.base_probability
            ),
        )?;
        non_negative("bonding.curve.falloff", b.curve.falloff())?;
        ensure(
            b.tension_ratio > 1.0,
            format!(
                "bonding.tension_ratio must exceed 1 (got {})",
                b.tension_ratio
            ),
        )?;
        ensure(
            b.tension_sustain_steps > 0,
            "bonding.tension_sustain_steps must be at least 1",
        )?;
        ensure(
            b.snap_ratio >= b.tension_ratio,
            format!(
                "bonding.snap_ratio ({}) must not be below tension_ratio ({})",
                b.snap_ratio, b.tension_ratio
            ),
        )?;
        non_negative("bonding.thermal_break_rate", b.thermal_break_rate)?;
        non_negative("bonding.connectivity_weight", b.connectivity_weight)?;

        for (i, zone) in self.zones.iter().enumerate() {
            zone.validate()
                .map_err(|reason| SimulationError::InvalidConfig(format!("zone #{i}: {reason}")))?;
        }

        Ok(())
    }
}

fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(SimulationError::InvalidConfig(message.into()))
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    ensure(
        value.is_finite() && value > 0.0,
        format!("{name} must be positive (got {value})"),
    )
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    ensure(
        value.is_finite() && value >= 0.0,
        format!("{name} must not be negative (got {value})"),
    )
}
