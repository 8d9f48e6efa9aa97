//! Cache of flow fields keyed by destination tile.
//!
//! Fields are handed out as `Arc`s; entities keep only a `Weak` (see
//! [`FlowFieldRef`](crate::components::FlowFieldRef)). Clearing the cache
//! moves every field nobody else is holding into a recycle pool so the next
//! request reuses its buffers instead of allocating. A cache miss first
//! evicts fields no entity refers to any more, so the cache holds at most one
//! field per destination that is still being walked to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};
use tracing::{debug, info};

use super::flow_field::{CostField, FlowField};
use crate::tilemap::TileMap;

/// Shared flow field cache. Safe to call from any thread.
#[derive(Resource, Debug, Default)]
pub struct FlowFieldManager {
    costs: RwLock<Option<Arc<CostField>>>,
    active: RwLock<HashMap<IVec2, Arc<FlowField>>>,
    pool: Mutex<Vec<FlowField>>,
}

impl FlowFieldManager {
    pub fn new(map: &TileMap) -> Self {
        let manager = Self::default();
        manager.initialize(map);
        manager
    }

    /// Bind to a new map. Cached fields for the previous map are recycled.
    pub fn initialize(&self, map: &TileMap) {
        *self.costs.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(CostField::from_tilemap(map)));
        self.clear();
        info!(
            width = map.width,
            height = map.height,
            "FlowFieldManager initialized"
        );
    }

    /// Field leading to the tile containing `target`.
    ///
    /// Returns the cached field when one exists, otherwise builds one (from
    /// the pool when possible). `None` when no map is loaded or the target
    /// lies outside the map.
    pub fn get_flow_field(&self, target: Vec2) -> Option<Arc<FlowField>> {
        let costs = self
            .costs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        let tile = costs.world_to_tile(target);
        if !costs.in_bounds(tile) {
            return None;
        }

        if let Some(field) = self
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tile)
        {
            return Some(Arc::clone(field));
        }

        self.evict_unreferenced();
        let recycled = self.pool.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let field = match recycled {
            Some(mut field) => {
                field.rebuild(Arc::clone(&costs), target);
                field
            }
            None => FlowField::new(Arc::clone(&costs), target),
        };
        debug!(x = tile.x, y = tile.y, "Generated flow field");

        // Another thread may have raced us to the same tile; keep the first.
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let field = active.entry(tile).or_insert_with(|| Arc::new(field));
        Some(Arc::clone(field))
    }

    /// Recycle every cached field. Fields still borrowed elsewhere are dropped
    /// once their last holder lets go instead of returning to the pool.
    pub fn clear(&self) {
        let drained: Vec<Arc<FlowField>> = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, field)| field)
            .collect();

        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        pool.extend(drained.into_iter().filter_map(|field| Arc::try_unwrap(field).ok()));
    }

    /// Move every cached field that has no outside holder, strong or weak,
    /// into the recycle pool. Returns how many were evicted.
    pub fn evict_unreferenced(&self) -> usize {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<IVec2> = active
            .iter()
            .filter(|(_, field)| Arc::strong_count(field) == 1 && Arc::weak_count(field) == 0)
            .map(|(tile, _)| *tile)
            .collect();

        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        for tile in &stale {
            if let Some(field) = active.remove(tile).and_then(|field| Arc::try_unwrap(field).ok()) {
                pool.push(field);
            }
        }
        if !stale.is_empty() {
            debug!(evicted = stale.len(), "Evicted unreferenced flow fields");
        }
        stale.len()
    }

    /// Number of fields currently cached.
    pub fn active_count(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of fields waiting in the recycle pool.
    pub fn pooled_count(&self) -> usize {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Cost field of the loaded map, if any.
    pub fn cost_field(&self) -> Option<Arc<CostField>> {
        self.costs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::FlowFieldRef;

    fn manager() -> FlowFieldManager {
        FlowFieldManager::new(&TileMap::new(20, 20, 10.0))
    }

    #[test]
    fn test_fields_are_cached_per_tile() {
        let manager = manager();
        let a = manager.get_flow_field(Vec2::new(55.0, 55.0)).unwrap();
        let b = manager.get_flow_field(Vec2::new(51.0, 59.0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.active_count(), 1);

        let c = manager.get_flow_field(Vec2::new(105.0, 55.0)).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn test_miss_evicts_fields_nobody_follows() {
        let manager = manager();
        let field = manager.get_flow_field(Vec2::new(15.0, 15.0)).unwrap();
        let follower = FlowFieldRef::new(Some(&field));
        drop(field);
        let abandoned = manager.get_flow_field(Vec2::new(55.0, 55.0)).unwrap();
        drop(abandoned);
        assert_eq!(manager.active_count(), 2);

        // The abandoned field is recycled into the new request
        let fresh = manager.get_flow_field(Vec2::new(105.0, 105.0)).unwrap();
        assert_eq!(manager.active_count(), 2);
        assert_eq!(manager.pooled_count(), 0);
        assert_eq!(fresh.target(), IVec2::new(10, 10));
        assert_eq!(follower.resolve().unwrap().target(), IVec2::new(1, 1));

        drop(follower);
        drop(fresh);
        assert_eq!(manager.evict_unreferenced(), 2);
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.pooled_count(), 2);
    }

    #[test]
    fn test_out_of_bounds_target_returns_none() {
        let manager = manager();
        assert!(manager.get_flow_field(Vec2::new(-5.0, 5.0)).is_none());
        assert!(manager.get_flow_field(Vec2::new(5.0, 200.0)).is_none());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_uninitialized_manager_returns_none() {
        let manager = FlowFieldManager::default();
        assert!(manager.get_flow_field(Vec2::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn test_clear_recycles_and_invalidates_refs() {
        let manager = manager();
        let field = manager.get_flow_field(Vec2::new(15.0, 15.0)).unwrap();
        let flow_ref = FlowFieldRef::new(Some(&field));
        drop(field);
        assert!(flow_ref.resolve().is_some());

        manager.clear();
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.pooled_count(), 1);
        assert!(flow_ref.resolve().is_none());

        // The pooled field is reused for the next request
        let regenerated = manager.get_flow_field(Vec2::new(150.0, 150.0)).unwrap();
        assert_eq!(manager.pooled_count(), 0);
        assert_eq!(regenerated.target(), IVec2::new(15, 15));
    }

    #[test]
    fn test_clear_drops_borrowed_fields() {
        let manager = manager();
        let held = manager.get_flow_field(Vec2::new(15.0, 15.0)).unwrap();
        manager.clear();
        assert_eq!(manager.pooled_count(), 0);
        assert_eq!(held.target(), IVec2::new(1, 1));
    }
}
