// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Spatial grid for fast neighbor queries with distance cutoff.
//
// Partitions the world box into a fixed array of cubic cells. Each cell owns a bounded bucket of
// particle indices. The grid is rebuilt from scratch every step: one parallel pass in which each
// particle atomically appends itself to its cell's bucket, then a pass that sorts every bucket so
// the result does not depend on scheduling. Neighbor queries iterate the axis-aligned bounding
// box (AABB) of the query sphere in grid coordinates and check actual distances.

use crate::config::SimulationConfig;
use glam::Vec3;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A uniform 3D grid over the world box with bounded per-cell buckets.
///
/// Positions outside the world box are assigned to the nearest border cell.
pub struct SpatialGrid {
    origin: Vec3,
    cell_size: f32,
    inv_cell_size: f32,
    dims: [usize; 3],
    max_per_cell: usize,
    counts: Vec<AtomicU32>,
    slots: Vec<AtomicU32>,
}

impl SpatialGrid {
    pub fn new(config: &SimulationConfig) -> Self {
        debug_assert!(config.cell_size > 0.0, "cell_size must be positive");
        let dims = config.grid_dims();
        let cells = dims[0] * dims[1] * dims[2];
        Self {
            origin: config.world_min,
            cell_size: config.cell_size,
            inv_cell_size: 1.0 / config.cell_size,
            dims,
            max_per_cell: config.max_per_cell,
            counts: (0..cells).map(|_| AtomicU32::new(0)).collect(),
            slots: (0..cells * config.max_per_cell)
                .map(|_| AtomicU32::new(0))
                .collect(),
        }
    }

    /// Re-partitions every active particle. Returns the number of particles that did not fit in
    /// their cell's bucket; those are absent from neighbor queries until the next rebuild.
    pub fn rebuild(&mut self, positions: &[Vec3], active: &[bool]) -> usize {
        debug_assert_eq!(positions.len(), active.len());
        self.counts
            .par_iter_mut()
            .for_each(|count| *count.get_mut() = 0);

        let dropped = AtomicUsize::new(0);
        let grid = &*self;
        positions
            .par_iter()
            .zip(active.par_iter())
            .enumerate()
            .for_each(|(i, (&position, &is_active))| {
                if !is_active {
                    return;
                }
                let cell = grid.cell_of(position);
                let slot = grid.counts[cell].fetch_add(1, Ordering::Relaxed) as usize;
                if slot < grid.max_per_cell {
                    grid.slots[cell * grid.max_per_cell + slot].store(i as u32, Ordering::Relaxed);
                } else {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            });

        let max_per_cell = self.max_per_cell;
        self.slots
            .par_chunks_mut(max_per_cell)
            .zip(self.counts.par_iter_mut())
            .for_each(|(bucket, count)| {
                let len = (*count.get_mut() as usize).min(max_per_cell);
                *count.get_mut() = len as u32;
                bucket[..len].sort_unstable_by_key(|slot| slot.load(Ordering::Relaxed));
            });

        dropped.into_inner()
    }

    /// Integer cell coordinates of `position`, clamped to the grid.
    #[inline]
    pub fn cell_coords(&self, position: Vec3) -> [usize; 3] {
        let local = (position - self.origin) * self.inv_cell_size;
        let clamp = |v: f32, dim: usize| (v.floor() as i64).clamp(0, dim as i64 - 1) as usize;
        [
            clamp(local.x, self.dims[0]),
            clamp(local.y, self.dims[1]),
            clamp(local.z, self.dims[2]),
        ]
    }

    #[inline]
    fn flat(&self, [x, y, z]: [usize; 3]) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    /// Flat index of the cell containing `position`.
    #[inline]
    pub fn cell_of(&self, position: Vec3) -> usize {
        self.flat(self.cell_coords(position))
    }

    /// The cell itself and its up to 26 neighbors.
    pub fn neighbor_cells(&self, cell: usize) -> SmallVec<[usize; 27]> {
        let x = cell % self.dims[0];
        let y = (cell / self.dims[0]) % self.dims[1];
        let z = cell / (self.dims[0] * self.dims[1]);
        let span = |c: usize, dim: usize| c.saturating_sub(1)..=(c + 1).min(dim - 1);

        let mut cells = SmallVec::new();
        for gz in span(z, self.dims[2]) {
            for gy in span(y, self.dims[1]) {
                for gx in span(x, self.dims[0]) {
                    cells.push(self.flat([gx, gy, gz]));
                }
            }
        }
        cells
    }

    /// Particle indices bucketed in `cell`, in ascending order.
    pub fn bucket(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let len = self.counts[cell].load(Ordering::Relaxed) as usize;
        let start = cell * self.max_per_cell;
        self.slots[start..start + len]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed) as usize)
    }

    /// Calls `f(j)` for each bucketed particle `j` with `dist(point, j) < radius`.
    pub fn for_each_within<F: FnMut(usize)>(
        &self,
        positions: &[Vec3],
        point: Vec3,
        radius: f32,
        mut f: F,
    ) {
        let radius_sq = radius * radius;

        // AABB of sphere in grid coordinates.
        let lo = self.cell_coords(point - Vec3::splat(radius));
        let hi = self.cell_coords(point + Vec3::splat(radius));

        for gz in lo[2]..=hi[2] {
            for gy in lo[1]..=hi[1] {
                for gx in lo[0]..=hi[0] {
                    for j in self.bucket(self.flat([gx, gy, gz])) {
                        if point.distance_squared(positions[j]) < radius_sq {
                            f(j);
                        }
                    }
                }
            }
        }
    }

    /// Calls `f(j)` for each particle `j != center_idx` within `radius` of particle `center_idx`.
    ///
    /// The caller is responsible for deduplication (e.g. only processing pairs where
    /// `j > center_idx`).
    pub fn for_each_neighbor<F: FnMut(usize)>(
        &self,
        positions: &[Vec3],
        center_idx: usize,
        radius: f32,
        mut f: F,
    ) {
        self.for_each_within(positions, positions[center_idx], radius, |j| {
            if j != center_idx {
                f(j);
            }
        });
    }

    /// Returns the cell size used by this grid.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    pub fn max_per_cell(&self) -> usize {
        self.max_per_cell
    }
}
