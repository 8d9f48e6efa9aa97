//! Spatial partitioning for broad-phase neighbor queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entities in nearby cells, rather than O(n) for brute force. The grid is
//! rebuilt from scratch every tick, so it never tracks movement.

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};
use std::collections::HashMap;

use crate::components::{BodyCollider, Disabled, IsDying, Position};

/// Default cell edge in world units, a few unit radii wide.
pub const DEFAULT_CELL_SIZE: f32 = 100.0;

/// Uniform-cell spatial hash over collider centers.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Map from cell coordinates to the entities bucketed there.
    cells: HashMap<IVec2, Vec<SpatialEntry>>,
    /// Smallest and largest occupied cell since the last clear.
    bounds: Option<(IVec2, IVec2)>,
    count: usize,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub entity: Entity,
    /// Collider center at the time the grid was built.
    pub position: Vec2,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            bounds: None,
            count: 0,
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> IVec2 {
        (pos / self.cell_size).floor().as_ivec2()
    }

    /// Empty every bucket. Bucket allocations are kept for the next rebuild.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.bounds = None;
        self.count = 0;
    }

    /// Insert an entity at a position. No duplicate check; call [`clear`](Self::clear) first.
    pub fn insert(&mut self, entity: Entity, position: Vec2) {
        let cell = self.world_to_cell(position);
        self.cells
            .entry(cell)
            .or_default()
            .push(SpatialEntry { entity, position });
        self.bounds = Some(match self.bounds {
            Some((lo, hi)) => (lo.min(cell), hi.max(cell)),
            None => (cell, cell),
        });
        self.count += 1;
    }

    /// Entries from every cell touching the square of side `2 * radius`
    /// around `center`. Includes false positives; callers confirm distance.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> impl Iterator<Item = SpatialEntry> + '_ {
        let extent = Vec2::splat(radius.abs());
        self.query_rect(center - extent, center + extent)
    }

    /// Entries from every cell touching the axis-aligned box `[min, max]`,
    /// visited row by row.
    ///
    /// The box is clamped to the occupied extent first, so huge boxes over a
    /// sparse grid only walk the cells that can hold entries.
    pub fn query_rect(&self, min: Vec2, max: Vec2) -> impl Iterator<Item = SpatialEntry> + '_ {
        let (mut lo, mut hi) = (self.world_to_cell(min.min(max)), self.world_to_cell(min.max(max)));
        match self.bounds {
            Some((occupied_lo, occupied_hi)) => {
                lo = lo.max(occupied_lo);
                hi = hi.min(occupied_hi);
            }
            // Nothing inserted: an inverted, empty range
            None => {
                lo = IVec2::ONE;
                hi = IVec2::ZERO;
            }
        }
        (lo.y..=hi.y)
            .flat_map(move |cy| (lo.x..=hi.x).map(move |cx| IVec2::new(cx, cy)))
            .filter_map(move |cell| self.cells.get(&cell))
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// Get count of entities in a cell.
    pub fn cell_count(&self, cell: IVec2) -> usize {
        self.cells.get(&cell).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total entity count.
    pub fn total_count(&self) -> usize {
        self.count
    }

    /// Non-empty cells (for debugging/visualization).
    pub fn occupied_cells(&self) -> impl Iterator<Item = (IVec2, &[SpatialEntry])> {
        self.cells
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(cell, bucket)| (*cell, bucket.as_slice()))
    }
}

/// System that rebuilds the spatial grid each tick from every live collider.
pub fn grid_build_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Position, &BodyCollider), (Without<Disabled>, Without<IsDying>)>,
) {
    grid.clear();

    for (entity, pos, collider) in query.iter() {
        grid.insert(entity, collider.center(pos.0));
    }
}
