//! Mouse hover detection.

use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::bridge::InputSnapshot;
use crate::components::*;
use crate::spatial::SpatialGrid;
use crate::systems::performance::SimConfig;

/// Search radius around the pointer. Sprites extend well past their collider.
const HOVER_QUERY_RADIUS: f32 = 400.0;

/// How the hovered entity relates to the local player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoverKind {
    #[default]
    None,
    Friend,
    Opponent,
}

/// Entity under the mouse this tick, for cursor rendering.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct HoverState {
    pub entity: Option<Entity>,
    pub kind: HoverKind,
}

fn render_box_contains(point: Vec2, center: Vec2, size: Vec2) -> bool {
    let half = size * 0.5;
    let d = (point - center).abs();
    d.x <= half.x && d.y <= half.y
}

/// Tags the selectable entity whose sprite box contains the mouse with
/// [`IsHovered`], preferring the one drawn in front (largest y).
pub fn cursor_detect_system(
    mut commands: Commands,
    snapshot: Res<InputSnapshot>,
    grid: Res<SpatialGrid>,
    config: Res<SimConfig>,
    mut hover: ResMut<HoverState>,
    candidates: Query<
        (&Position, &BodyCollider, &RenderSize, Option<&TeamId>),
        (With<Selectable>, Without<Disabled>, Without<IsDying>),
    >,
    hovered: Query<Entity, With<IsHovered>>,
) {
    let mouse = snapshot.mouse_world;

    let mut best: Option<(Entity, f32, Option<TeamId>)> = None;
    for entry in grid.query_radius(mouse, HOVER_QUERY_RADIUS) {
        let Ok((pos, collider, size, team)) = candidates.get(entry.entity) else {
            continue;
        };
        if !render_box_contains(mouse, collider.center(pos.0), size.0) {
            continue;
        }
        if best.map_or(true, |(_, y, _)| pos.0.y > y) {
            best = Some((entry.entity, pos.0.y, team.copied()));
        }
    }

    let current = best.map(|(entity, _, _)| entity);
    for entity in hovered.iter() {
        if Some(entity) != current {
            commands.entity(entity).remove::<IsHovered>();
        }
    }

    *hover = match best {
        Some((entity, _, team)) => {
            commands.entity(entity).insert(IsHovered);
            let kind = match team {
                Some(TeamId(team)) if team != config.local_team => HoverKind::Opponent,
                _ => HoverKind::Friend,
            };
            HoverState {
                entity: Some(entity),
                kind,
            }
        }
        None => HoverState::default(),
    };
}
