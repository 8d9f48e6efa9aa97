//! Render snapshot types.
//!
//! The `RenderSnapshot` struct provides a serializable, read-only view of the
//! simulation state that a renderer can draw without touching the ECS world.

use bevy_ecs::prelude::*;
use bevy_ecs::query::Has;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::config::DebugSettings;
use crate::input::{HoverKind, HoverState};

/// One drawable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderItem {
    /// `Entity::to_bits`, stable for the lifetime of the entity.
    pub entity: u64,
    pub index: u32,
    /// Unit or building type, `None` for untyped props.
    pub kind: Option<EntityType>,
    pub is_building: bool,
    pub team: u32,
    pub position: Vec2,
    pub render_size: Vec2,
    pub collider: Option<BodyCollider>,
    /// Remaining health as a fraction of max (1.0 without a `Health`).
    pub health: f32,
    /// Sprite-sheet frame to draw.
    pub frame: u32,
    pub selected: bool,
    pub hovered: bool,
    pub dying: bool,
}

/// Complete render-facing state for one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub tick: u64,
    pub time: f32,
    pub hover_entity: Option<u64>,
    pub hover_kind: HoverKind,
    pub debug: DebugSettings,
    /// Back to front (ascending y).
    pub items: Vec<RenderItem>,
}

type RenderQuery = (
    Entity,
    &'static Position,
    Option<&'static EntityClass>,
    Option<&'static BuildingClass>,
    Option<&'static TeamId>,
    Option<&'static RenderSize>,
    Option<&'static BodyCollider>,
    Option<&'static Health>,
    Option<&'static AnimationState>,
    Has<IsSelected>,
    Has<IsHovered>,
    Has<IsDying>,
);

impl RenderSnapshot {
    /// Collect every active, non-static entity, sorted for painter's order and
    /// capped at `max_items`. Items past the cap are dropped.
    pub fn from_world(world: &mut World, tick: u64, time: f32, max_items: usize) -> Self {
        let mut query =
            world.query_filtered::<RenderQuery, (Without<Disabled>, Without<StaticObstacle>)>();

        let mut items: Vec<RenderItem> = query
            .iter(world)
            .map(
                |(entity, pos, class, building, team, size, collider, health, anim, selected, hovered, dying)| {
                    RenderItem {
                        entity: entity.to_bits(),
                        index: entity.index(),
                        kind: building.map(|b| b.0).or(class.map(|c| c.0)),
                        is_building: building.is_some(),
                        team: team.map_or(0, |t| t.0),
                        position: pos.0,
                        render_size: size.map_or(Vec2::ZERO, |s| s.0),
                        collider: collider.copied(),
                        health: health.map_or(1.0, Health::fraction),
                        frame: anim.map_or(0, AnimationState::current_frame),
                        selected,
                        hovered,
                        dying,
                    }
                },
            )
            .collect();

        sort_back_to_front(&mut items);
        items.truncate(max_items);

        let hover = world.get_resource::<HoverState>().copied().unwrap_or_default();
        Self {
            tick,
            time,
            hover_entity: hover.entity.map(Entity::to_bits),
            hover_kind: hover.kind,
            debug: world.get_resource::<DebugSettings>().copied().unwrap_or_default(),
            items,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn back_to_front(a: &RenderItem, b: &RenderItem) -> std::cmp::Ordering {
    a.position.y.total_cmp(&b.position.y).then(a.entity.cmp(&b.entity))
}

#[cfg(feature = "parallel")]
fn sort_back_to_front(items: &mut [RenderItem]) {
    use rayon::slice::ParallelSliceMut;
    items.par_sort_by(back_to_front);
}

#[cfg(not(feature = "parallel"))]
fn sort_back_to_front(items: &mut [RenderItem]) {
    items.sort_by(back_to_front);
}
