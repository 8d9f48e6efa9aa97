//! Dijkstra-based flow fields over the tile grid.
//!
//! A field is built in three layers:
//! 1. a static per-map cost field (`u8`, 255 = impassable),
//! 2. an integration field of minimal accumulated cost to the target,
//!    relaxed breadth-first from the target with integer step costs,
//! 3. a vector field pointing every tile at its cheapest neighbor.
//!
//! Diagonal steps are never allowed past a blocked orthogonal tile, so
//! agents following the field cannot clip wall corners.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::{IVec2, Vec2};

use crate::tilemap::TileMap;

/// Cost of a tile nothing may enter.
pub const IMPASSABLE: u8 = u8::MAX;
/// Cost of ordinary walkable ground.
pub const BASE_COST: u8 = 1;

/// Step cost of an orthogonal move (x10 fixed point).
pub const COST_STRAIGHT: i32 = 10;
/// Step cost of a diagonal move (~sqrt(2) x10).
pub const COST_DIAGONAL: i32 = 14;

/// Integration value of tiles the target cannot reach.
pub const UNREACHABLE: i32 = i32::MAX;

const DIAGONAL_UNIT: f32 = 0.707_106_78;

/// Neighbor offsets in expansion order: W, E, N, S, then diagonals.
/// The order is also the tie-breaker when picking a direction.
const NEIGHBORS: [IVec2; 8] = [
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(0, -1),
    IVec2::new(0, 1),
    IVec2::new(-1, -1),
    IVec2::new(-1, 1),
    IVec2::new(1, 1),
    IVec2::new(1, -1),
];

/// Unit vector for a neighbor offset.
#[inline]
fn direction_of(offset: IVec2) -> Vec2 {
    match (offset.x, offset.y) {
        (1, 0) => Vec2::X,
        (-1, 0) => Vec2::NEG_X,
        (0, 1) => Vec2::Y,
        (0, -1) => Vec2::NEG_Y,
        (1, 1) => Vec2::new(DIAGONAL_UNIT, DIAGONAL_UNIT),
        (1, -1) => Vec2::new(DIAGONAL_UNIT, -DIAGONAL_UNIT),
        (-1, -1) => Vec2::new(-DIAGONAL_UNIT, -DIAGONAL_UNIT),
        (-1, 1) => Vec2::new(-DIAGONAL_UNIT, DIAGONAL_UNIT),
        _ => Vec2::ZERO,
    }
}

/// Static per-map movement cost of every tile.
#[derive(Debug, Clone)]
pub struct CostField {
    width: i32,
    height: i32,
    tile_size: f32,
    costs: Vec<u8>,
}

impl CostField {
    pub fn from_tilemap(map: &TileMap) -> Self {
        let mut costs = Vec::with_capacity(map.tile_count());
        for y in 0..map.height {
            for x in 0..map.width {
                costs.push(if map.is_walkable(x, y) { BASE_COST } else { IMPASSABLE });
            }
        }
        Self {
            width: map.width,
            height: map.height,
            tile_size: map.tile_size,
            costs,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    #[inline]
    pub fn in_bounds(&self, tile: IVec2) -> bool {
        tile.x >= 0 && tile.x < self.width && tile.y >= 0 && tile.y < self.height
    }

    #[inline]
    fn index(&self, tile: IVec2) -> usize {
        tile.y as usize * self.width as usize + tile.x as usize
    }

    /// Cost of a tile; out-of-bounds tiles are impassable.
    #[inline]
    pub fn cost(&self, tile: IVec2) -> u8 {
        if self.in_bounds(tile) {
            self.costs[self.index(tile)]
        } else {
            IMPASSABLE
        }
    }

    #[inline]
    pub fn is_passable(&self, tile: IVec2) -> bool {
        self.cost(tile) != IMPASSABLE
    }

    /// Tile containing a world position.
    #[inline]
    pub fn world_to_tile(&self, pos: Vec2) -> IVec2 {
        (pos / self.tile_size).floor().as_ivec2()
    }

    /// Whether a step from `from` by `offset` is allowed by the corner rule.
    /// Orthogonal steps always pass; diagonals need both shared neighbors open.
    #[inline]
    pub fn can_step(&self, from: IVec2, offset: IVec2) -> bool {
        if offset.x == 0 || offset.y == 0 {
            return true;
        }
        self.is_passable(IVec2::new(from.x + offset.x, from.y))
            && self.is_passable(IVec2::new(from.x, from.y + offset.y))
    }
}

/// Integration and vector fields toward one destination tile.
///
/// Fields are immutable once published by the manager; regeneration
/// happens on a recycled field that is no longer shared.
#[derive(Debug, Clone)]
pub struct FlowField {
    costs: Arc<CostField>,
    target: IVec2,
    integration: Vec<i32>,
    vectors: Vec<Vec2>,
}

impl FlowField {
    /// Build a field for the tile containing `target_world`.
    pub fn new(costs: Arc<CostField>, target_world: Vec2) -> Self {
        let mut field = Self {
            costs,
            target: IVec2::ZERO,
            integration: Vec::new(),
            vectors: Vec::new(),
        };
        field.regenerate(target_world);
        field
    }

    /// Rebind to a (possibly new) cost field and rebuild toward `target_world`.
    /// Buffers are reused, which is what makes pooled fields cheap.
    pub fn rebuild(&mut self, costs: Arc<CostField>, target_world: Vec2) {
        self.costs = costs;
        self.regenerate(target_world);
    }

    fn regenerate(&mut self, target_world: Vec2) {
        let len = self.costs.costs.len();
        self.integration.clear();
        self.integration.resize(len, UNREACHABLE);
        self.vectors.clear();
        self.vectors.resize(len, Vec2::ZERO);

        let target = self.costs.world_to_tile(target_world);
        self.target = target;
        if !self.costs.in_bounds(target) {
            return;
        }

        self.integrate(target);
        self.derive_vectors();
    }

    fn integrate(&mut self, target: IVec2) {
        let costs = Arc::clone(&self.costs);
        let mut open = VecDeque::new();
        self.integration[costs.index(target)] = 0;
        open.push_back(target);

        while let Some(current) = open.pop_front() {
            let current_value = self.integration[costs.index(current)];

            for offset in NEIGHBORS {
                let next = current + offset;
                let cost = costs.cost(next);
                if cost == IMPASSABLE || !costs.can_step(current, offset) {
                    continue;
                }

                let step = if offset.x != 0 && offset.y != 0 {
                    COST_DIAGONAL
                } else {
                    COST_STRAIGHT
                };
                let candidate = current_value + step * cost as i32;
                let idx = costs.index(next);
                if candidate < self.integration[idx] {
                    self.integration[idx] = candidate;
                    open.push_back(next);
                }
            }
        }
    }

    fn derive_vectors(&mut self) {
        let costs = Arc::clone(&self.costs);
        for y in 0..costs.height {
            for x in 0..costs.width {
                let tile = IVec2::new(x, y);
                let idx = costs.index(tile);
                let value = self.integration[idx];
                if !costs.is_passable(tile) || value == UNREACHABLE {
                    continue;
                }
                if let Some(offset) = self.best_neighbor(tile, value) {
                    self.vectors[idx] = direction_of(offset);
                }
            }
        }
    }

    /// First neighbor (in [`NEIGHBORS`] order) with the strictly lowest
    /// integration value below `threshold` that passes the corner rule.
    fn best_neighbor(&self, tile: IVec2, threshold: i32) -> Option<IVec2> {
        let mut best = threshold;
        let mut best_offset = None;
        for offset in NEIGHBORS {
            let next = tile + offset;
            if !self.costs.is_passable(next) || !self.costs.can_step(tile, offset) {
                continue;
            }
            let value = self.integration[self.costs.index(next)];
            if value < best {
                best = value;
                best_offset = Some(offset);
            }
        }
        best_offset
    }

    /// Destination tile of this field.
    pub fn target(&self) -> IVec2 {
        self.target
    }

    /// World-space center of the destination tile.
    pub fn target_center(&self) -> Vec2 {
        (self.target.as_vec2() + Vec2::splat(0.5)) * self.costs.tile_size
    }

    pub fn costs(&self) -> &CostField {
        &self.costs
    }

    /// Accumulated cost from `tile` to the destination, or `None` when unreachable.
    pub fn integration_at(&self, tile: IVec2) -> Option<i32> {
        if !self.costs.in_bounds(tile) {
            return None;
        }
        let value = self.integration[self.costs.index(tile)];
        (value != UNREACHABLE).then_some(value)
    }

    /// Stored direction of a tile (zero for walls, pockets and the destination).
    pub fn vector_at(&self, tile: IVec2) -> Vec2 {
        if !self.costs.in_bounds(tile) {
            return Vec2::ZERO;
        }
        self.vectors[self.costs.index(tile)]
    }

    /// Direction an agent at `world_pos` should move in.
    ///
    /// Out of bounds gives zero. When the tile has no stored direction and is
    /// not the destination, the agent escapes toward its cheapest reachable
    /// neighbor so it never freezes in a pocket or inside a wall tile.
    pub fn flow_direction(&self, world_pos: Vec2) -> Vec2 {
        let tile = self.costs.world_to_tile(world_pos);
        if !self.costs.in_bounds(tile) {
            return Vec2::ZERO;
        }
        let dir = self.vectors[self.costs.index(tile)];
        if dir != Vec2::ZERO || tile == self.target {
            return dir;
        }
        self.best_neighbor(tile, UNREACHABLE)
            .map(direction_of)
            .unwrap_or(Vec2::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::TileKind;

    fn open_map(w: i32, h: i32) -> TileMap {
        TileMap::new(w, h, 10.0)
    }

    fn field_for(map: &TileMap, target_tile: IVec2) -> FlowField {
        let costs = Arc::new(CostField::from_tilemap(map));
        FlowField::new(costs, map.grid_to_world_center(target_tile.x, target_tile.y))
    }

    #[test]
    fn test_integration_costs_straight_and_diagonal() {
        let map = open_map(5, 5);
        let field = field_for(&map, IVec2::new(2, 2));
        assert_eq!(field.integration_at(IVec2::new(2, 2)), Some(0));
        assert_eq!(field.integration_at(IVec2::new(3, 2)), Some(10));
        assert_eq!(field.integration_at(IVec2::new(3, 3)), Some(14));
        assert_eq!(field.integration_at(IVec2::new(4, 4)), Some(28));
        assert_eq!(field.integration_at(IVec2::new(4, 3)), Some(24));
    }

    #[test]
    fn test_vectors_point_at_target() {
        let map = open_map(5, 5);
        let field = field_for(&map, IVec2::new(2, 2));
        assert_eq!(field.vector_at(IVec2::new(0, 2)), Vec2::X);
        assert_eq!(field.vector_at(IVec2::new(2, 4)), Vec2::NEG_Y);
        let diag = field.vector_at(IVec2::new(4, 4));
        assert!((diag - Vec2::new(-DIAGONAL_UNIT, -DIAGONAL_UNIT)).length() < 1e-6);
        assert_eq!(field.vector_at(IVec2::new(2, 2)), Vec2::ZERO);
    }

    #[test]
    fn test_walls_and_unreachable_tiles_are_zero() {
        let mut map = open_map(5, 5);
        // Seal (4,4) off behind walls
        map.set_tile(3, 4, TileKind::Wall);
        map.set_tile(4, 3, TileKind::Wall);
        map.set_tile(3, 3, TileKind::Wall);
        let field = field_for(&map, IVec2::new(0, 0));

        assert_eq!(field.vector_at(IVec2::new(3, 3)), Vec2::ZERO);
        assert_eq!(field.integration_at(IVec2::new(4, 4)), None);
        assert_eq!(field.vector_at(IVec2::new(4, 4)), Vec2::ZERO);
    }

    #[test]
    fn test_no_corner_cutting_between_diagonal_walls() {
        // . #
        // # .   the two open tiles only touch through the wall corner
        let mut map = open_map(2, 2);
        map.set_tile(1, 0, TileKind::Wall);
        map.set_tile(0, 1, TileKind::Wall);
        let field = field_for(&map, IVec2::new(0, 0));

        assert_eq!(field.integration_at(IVec2::new(1, 1)), None);
        assert_eq!(field.vector_at(IVec2::new(1, 1)), Vec2::ZERO);
    }

    #[test]
    fn test_diagonal_blocked_by_single_wall_goes_around() {
        let mut map = open_map(3, 3);
        map.set_tile(1, 0, TileKind::Wall);
        let field = field_for(&map, IVec2::new(2, 0));
        // From (1,1) the NE diagonal to (2,0) clips the wall at (1,0)
        assert_eq!(field.vector_at(IVec2::new(1, 1)), Vec2::X);
        assert_eq!(field.integration_at(IVec2::new(1, 1)), Some(20));
    }

    #[test]
    fn test_out_of_bounds_target_produces_empty_field() {
        let map = open_map(4, 4);
        let costs = Arc::new(CostField::from_tilemap(&map));
        let field = FlowField::new(costs, Vec2::new(-50.0, 10.0));
        assert_eq!(field.integration_at(IVec2::new(0, 0)), None);
        assert_eq!(field.flow_direction(Vec2::new(5.0, 5.0)), Vec2::ZERO);
    }

    #[test]
    fn test_flow_direction_out_of_bounds_is_zero() {
        let map = open_map(4, 4);
        let field = field_for(&map, IVec2::new(3, 3));
        assert_eq!(field.flow_direction(Vec2::new(-1.0, 5.0)), Vec2::ZERO);
        assert_eq!(field.flow_direction(Vec2::new(5.0, 400.0)), Vec2::ZERO);
    }

    #[test]
    fn test_escape_from_wall_tile() {
        let mut map = open_map(3, 1);
        map.set_tile(1, 0, TileKind::Wall);
        map.set_tile(2, 0, TileKind::Grass);
        let field = field_for(&map, IVec2::new(0, 0));
        // An agent pushed onto the wall tile walks back toward the open side
        assert_eq!(field.flow_direction(Vec2::new(15.0, 5.0)), Vec2::NEG_X);
    }

    #[test]
    fn test_destination_tile_has_no_escape() {
        let map = open_map(3, 3);
        let field = field_for(&map, IVec2::new(1, 1));
        assert_eq!(field.flow_direction(Vec2::new(15.0, 15.0)), Vec2::ZERO);
    }

    #[test]
    fn test_rebuild_reuses_buffers() {
        let map = open_map(6, 6);
        let costs = Arc::new(CostField::from_tilemap(&map));
        let mut field = FlowField::new(Arc::clone(&costs), map.grid_to_world_center(0, 0));
        field.rebuild(costs, map.grid_to_world_center(5, 5));
        assert_eq!(field.target(), IVec2::new(5, 5));
        assert_eq!(field.integration_at(IVec2::new(5, 5)), Some(0));
        assert_eq!(field.integration_at(IVec2::new(0, 0)), Some(70));
    }
}
