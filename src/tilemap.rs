//! Tile map - terrain kinds, grid/world conversion, and static obstacles.
//!
//! The map is a row-major grid of tiles. Only grass is walkable; every other
//! kind is an obstacle for both the flow field cost pass and the collision
//! pass (walls and water become static AABB colliders when the map loads).

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::components::{BodyCollider, Position, StaticObstacle};

/// Avoidance weight of a terrain obstacle. Large enough that units never push through.
pub const OBSTACLE_AVOIDANCE_FORCE: f32 = 99_999.0;

/// Kind of terrain occupying a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Grass,
    Tree,
    Water,
    Wall,
}

impl TileKind {
    pub fn is_walkable(self) -> bool {
        matches!(self, TileKind::Grass)
    }

    /// Tiles that get a physical collider when the map is loaded.
    pub fn is_solid(self) -> bool {
        matches!(self, TileKind::Wall | TileKind::Water)
    }
}

/// Grid-based terrain map, read-only while the simulation runs.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    /// Width of the map in tiles.
    pub width: i32,
    /// Height of the map in tiles.
    pub height: i32,
    /// Edge length of one tile in world units.
    pub tile_size: f32,
    tiles: Vec<TileKind>,
}

/// Tile count of a `width` x `height` grid, widened before multiplying so
/// large maps cannot overflow `i32`.
fn tile_area(width: i32, height: i32) -> usize {
    width.max(0) as usize * height.max(0) as usize
}

impl TileMap {
    /// Create a map filled with grass.
    pub fn new(width: i32, height: i32, tile_size: f32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tile_size,
            tiles: vec![TileKind::Grass; tile_area(width, height)],
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Number of tiles on the map.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Tile at grid coordinates. Anything outside the map reads as a wall.
    pub fn get_tile(&self, x: i32, y: i32) -> TileKind {
        if self.in_bounds(x, y) {
            self.tiles[self.index(x, y)]
        } else {
            TileKind::Wall
        }
    }

    /// Overwrite a tile. Out-of-bounds writes are ignored.
    pub fn set_tile(&mut self, x: i32, y: i32, kind: TileKind) {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            self.tiles[idx] = kind;
        }
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.get_tile(x, y).is_walkable()
    }

    /// World-space center of the tile at `(x, y)`.
    pub fn grid_to_world_center(&self, x: i32, y: i32) -> Vec2 {
        Vec2::new(
            x as f32 * self.tile_size + self.tile_size * 0.5,
            y as f32 * self.tile_size + self.tile_size * 0.5,
        )
    }

    /// Tile containing a world position (may be out of bounds).
    pub fn world_to_grid(&self, pos: Vec2) -> IVec2 {
        (pos / self.tile_size).floor().as_ivec2()
    }

    /// Total extent of the map in world units.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f32 * self.tile_size,
            self.height as f32 * self.tile_size,
        )
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, kind: TileKind) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.set_tile(x, y, kind);
            }
        }
    }

    /// Generate the demo battlefield.
    ///
    /// Layout: a solid border, a horizontal moat crossed by a single bridge,
    /// a U-shaped trap that opens upwards, a forest patch, a diagonal wall
    /// line and a walled room with one door. Sized for maps of at least
    /// 100x100 tiles; smaller maps just clip the features.
    pub fn demo(width: i32, height: i32, tile_size: f32) -> Self {
        let mut map = Self::new(width, height, tile_size);
        let (w, h) = (map.width, map.height);

        // Border
        map.fill_rect(0, 0, w - 1, 0, TileKind::Wall);
        map.fill_rect(0, h - 1, w - 1, h - 1, TileKind::Wall);
        map.fill_rect(0, 0, 0, h - 1, TileKind::Wall);
        map.fill_rect(w - 1, 0, w - 1, h - 1, TileKind::Wall);

        // Moat with a bridge in the middle
        let moat_y = h / 2;
        map.fill_rect(1, moat_y, w - 2, moat_y + 2, TileKind::Water);
        map.fill_rect(w / 2 - 2, moat_y, w / 2 + 2, moat_y + 2, TileKind::Grass);

        // U-shaped trap
        let (ux, uy) = (w / 5, h / 5);
        map.fill_rect(ux, uy, ux, uy + 15, TileKind::Wall);
        map.fill_rect(ux + 15, uy, ux + 15, uy + 15, TileKind::Wall);
        map.fill_rect(ux, uy + 15, ux + 15, uy + 15, TileKind::Wall);

        // Forest patch
        map.fill_rect(w * 3 / 5, h / 8, w * 3 / 5 + 12, h / 8 + 8, TileKind::Tree);

        // Diagonal wall line
        let start = (w / 8, h * 3 / 4 - 10);
        for i in 0..20 {
            map.set_tile(start.0 + i, start.1 + i, TileKind::Wall);
        }

        // Room with a door on the west side
        let (rx, ry) = (w * 3 / 4, h * 3 / 4);
        map.fill_rect(rx, ry, rx + 12, ry, TileKind::Wall);
        map.fill_rect(rx, ry + 12, rx + 12, ry + 12, TileKind::Wall);
        map.fill_rect(rx, ry, rx, ry + 12, TileKind::Wall);
        map.fill_rect(rx + 12, ry, rx + 12, ry + 12, TileKind::Wall);
        map.fill_rect(rx, ry + 5, rx, ry + 7, TileKind::Grass);

        map
    }
}

impl Default for TileMap {
    fn default() -> Self {
        Self::new(0, 0, 50.0)
    }
}

/// Spawn one static AABB obstacle per solid tile of the map in the world.
///
/// Returns the number of obstacles spawned. Callers reloading a map must
/// despawn previous obstacles first (see [`despawn_map_obstacles`]).
pub fn spawn_map_obstacles(world: &mut World) -> usize {
    let Some(map) = world.get_resource::<TileMap>() else {
        return 0;
    };

    let half = Vec2::splat(map.tile_size * 0.5);
    let mut obstacles = Vec::new();
    for y in 0..map.height {
        for x in 0..map.width {
            if map.get_tile(x, y).is_solid() {
                obstacles.push((
                    Position(map.grid_to_world_center(x, y)),
                    BodyCollider::aabb(half, OBSTACLE_AVOIDANCE_FORCE),
                    StaticObstacle,
                ));
            }
        }
    }

    let count = obstacles.len();
    world.spawn_batch(obstacles);
    info!(count, "Spawned static map obstacles");
    count
}

/// Remove every static obstacle entity created by a previous map load.
pub fn despawn_map_obstacles(world: &mut World) {
    let stale: Vec<Entity> = world
        .query_filtered::<Entity, With<StaticObstacle>>()
        .iter(world)
        .collect();
    for entity in stale {
        world.despawn(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_area_is_widened() {
        assert_eq!(tile_area(70_000, 70_000), 4_900_000_000);
        assert_eq!(tile_area(-3, 5), 0);
        assert_eq!(TileMap::new(7, 3, 10.0).tile_count(), 21);
    }

    #[test]
    fn test_out_of_bounds_is_wall() {
        let map = TileMap::new(4, 4, 10.0);
        assert_eq!(map.get_tile(-1, 0), TileKind::Wall);
        assert_eq!(map.get_tile(4, 0), TileKind::Wall);
        assert_eq!(map.get_tile(0, 4), TileKind::Wall);
        assert_eq!(map.get_tile(2, 2), TileKind::Grass);
    }

    #[test]
    fn test_only_grass_is_walkable() {
        let mut map = TileMap::new(4, 1, 10.0);
        map.set_tile(1, 0, TileKind::Tree);
        map.set_tile(2, 0, TileKind::Water);
        map.set_tile(3, 0, TileKind::Wall);
        assert!(map.is_walkable(0, 0));
        assert!(!map.is_walkable(1, 0));
        assert!(!map.is_walkable(2, 0));
        assert!(!map.is_walkable(3, 0));
    }

    #[test]
    fn test_grid_world_conversion() {
        let map = TileMap::new(10, 10, 50.0);
        assert_eq!(map.grid_to_world_center(2, 3), Vec2::new(125.0, 175.0));
        assert_eq!(map.world_to_grid(Vec2::new(125.0, 175.0)), IVec2::new(2, 3));
        assert_eq!(map.world_to_grid(Vec2::new(-1.0, 0.0)), IVec2::new(-1, 0));
    }

    #[test]
    fn test_demo_map_has_border_and_bridge() {
        let map = TileMap::demo(100, 100, 50.0);
        assert_eq!(map.get_tile(0, 50), TileKind::Wall);
        assert_eq!(map.get_tile(99, 10), TileKind::Wall);
        assert_eq!(map.get_tile(10, 50), TileKind::Water);
        assert_eq!(map.get_tile(50, 51), TileKind::Grass);
    }

    #[test]
    fn test_spawn_map_obstacles() {
        let mut world = World::new();
        let mut map = TileMap::new(5, 5, 50.0);
        map.set_tile(1, 1, TileKind::Wall);
        map.set_tile(2, 1, TileKind::Water);
        map.set_tile(3, 1, TileKind::Tree);
        world.insert_resource(map);

        assert_eq!(spawn_map_obstacles(&mut world), 2);

        let mut query = world.query_filtered::<(&Position, &BodyCollider), With<StaticObstacle>>();
        let mut positions: Vec<Vec2> = query.iter(&world).map(|(p, _)| p.0).collect();
        positions.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(positions, vec![Vec2::new(75.0, 75.0), Vec2::new(125.0, 75.0)]);
        for (_, collider) in query.iter(&world) {
            assert_eq!(collider.size, Vec2::splat(25.0));
        }

        despawn_map_obstacles(&mut world);
        assert_eq!(query.iter(&world).count(), 0);
    }
}
