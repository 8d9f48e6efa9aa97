//! Command handlers and the registry that routes commands to them.
//!
//! Handlers never touch the world directly: they read through
//! [`CommandContext`] and queue every change on [`Commands`], so all
//! commands of a tick observe the same pre-tick state.

use std::cmp::Ordering;
use std::collections::HashMap;

use bevy_ecs::prelude::*;
use bevy_ecs::query::Has;
use bevy_ecs::system::SystemParam;
use glam::Vec2;
use tracing::debug;

use super::commands::GameCommand;
use crate::collision::{collider_overlaps_rect, point_in_collider};
use crate::components::*;
use crate::config::DebugSettings;
use crate::navigation::FlowFieldManager;
use crate::spatial::SpatialGrid;
use crate::systems::performance::SimConfig;

/// Squared pointer travel below which a selection counts as a click.
pub const DRAG_THRESHOLD_SQ: f32 = 16.0;
/// Half-size of the search box around a click.
pub const CLICK_TOLERANCE: f32 = 15.0;
/// Grid buckets hold collider centers; widen rect searches so large bodies
/// whose edge reaches into the rect are still considered.
const SELECT_QUERY_MARGIN: f32 = 200.0;

/// Read access handlers get to the world.
#[derive(SystemParam)]
pub struct CommandContext<'w, 's> {
    pub grid: Res<'w, SpatialGrid>,
    pub flow_fields: Res<'w, FlowFieldManager>,
    pub config: Res<'w, SimConfig>,
    pub selectable: Query<
        'w,
        's,
        (&'static Position, &'static BodyCollider, Has<BuildingClass>),
        (With<Selectable>, Without<Disabled>, Without<IsDying>),
    >,
    pub selected: Query<'w, 's, Entity, With<IsSelected>>,
    pub movers: Query<
        'w,
        's,
        (Entity, &'static Position, &'static Destination),
        (With<IsSelected>, With<Selectable>, Without<Disabled>, Without<IsDying>),
    >,
    pub producers: Query<'w, 's, Entity, (With<AutoProduction>, With<IsSelected>, Without<Disabled>)>,
}

/// Handles one kind of [`GameCommand`].
pub trait CommandHandler: Send + Sync + 'static {
    fn handle(&self, commands: &mut Commands, command: &GameCommand, ctx: &CommandContext, dt: f32);
}

/// Handlers keyed by [`GameCommand::kind`].
#[derive(Resource, Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::default();
        registry.register("Navigate", NavigateHandler);
        registry.register("Select", SelectHandler);
        registry.register("SetRally", SetRallyHandler);
        registry.register("ToggleDebug", ToggleDebugHandler);
        registry
    }

    pub fn register(&mut self, kind: &'static str, handler: impl CommandHandler) {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn CommandHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }
}

// ============================================================================
// NAVIGATE
// ============================================================================

/// Row-major order: by y, then x.
fn row_major(a: Vec2, b: Vec2) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Sends the selection to a point in formation, all units sharing one flow field.
///
/// Units and slots are both sorted row-major and paired in order, so the
/// front-left unit takes the front-left slot and paths rarely cross.
pub struct NavigateHandler;

impl CommandHandler for NavigateHandler {
    fn handle(&self, commands: &mut Commands, command: &GameCommand, ctx: &CommandContext, _dt: f32) {
        let GameCommand::Navigate { target } = *command else {
            return;
        };

        let mut units: Vec<(Entity, Vec2, Destination)> =
            ctx.movers.iter().map(|(e, pos, dest)| (e, pos.0, *dest)).collect();
        if units.is_empty() {
            return;
        }
        let Some(field) = ctx.flow_fields.get_flow_field(target) else {
            debug!(x = target.x, y = target.y, "Navigate target outside the map");
            return;
        };

        let mut slots = ctx.config.formation.slots(target, units.len());
        units.sort_by(|a, b| row_major(a.1, b.1));
        slots.sort_by(|a, b| row_major(*a, *b));

        for ((entity, _, dest), slot) in units.into_iter().zip(slots) {
            commands.entity(entity).insert((
                Destination::towards(slot, dest.stop_distance_sq),
                FlowFieldRef::new(Some(&field)),
            ));
        }
    }
}

// ============================================================================
// SELECT
// ============================================================================

/// Click or box selection.
///
/// A click picks the single body under the pointer, favouring the one drawn
/// in front (largest y). A box picks every unit it touches but never
/// buildings.
pub struct SelectHandler;

impl SelectHandler {
    fn clear_except(commands: &mut Commands, ctx: &CommandContext, keep: &[Entity]) {
        for entity in ctx.selected.iter() {
            if !keep.contains(&entity) {
                commands.entity(entity).remove::<IsSelected>();
            }
        }
    }
}

impl CommandHandler for SelectHandler {
    fn handle(&self, commands: &mut Commands, command: &GameCommand, ctx: &CommandContext, _dt: f32) {
        let GameCommand::Select { start, end, additive } = *command else {
            return;
        };

        let is_click = start.distance_squared(end) < DRAG_THRESHOLD_SQ;
        let (min, max) = if is_click {
            (end - Vec2::splat(CLICK_TOLERANCE), end + Vec2::splat(CLICK_TOLERANCE))
        } else {
            (start.min(end), start.max(end))
        };

        let margin = Vec2::splat(SELECT_QUERY_MARGIN);
        let mut hits: Vec<(Entity, Vec2)> = Vec::new();
        for entry in ctx.grid.query_rect(min - margin, max + margin) {
            let Ok((pos, collider, is_building)) = ctx.selectable.get(entry.entity) else {
                continue;
            };
            let hit = if is_click {
                point_in_collider(end, pos.0, collider)
            } else {
                !is_building && collider_overlaps_rect(pos.0, collider, min, max)
            };
            if hit {
                hits.push((entry.entity, pos.0));
            }
        }

        if is_click {
            let best = hits
                .iter()
                .map(|&(entity, pos)| (entity, pos.y * 1000.0 - pos.distance_squared(end)))
                .fold(None, |best: Option<(Entity, f32)>, (entity, score)| match best {
                    Some((_, best_score)) if best_score >= score => best,
                    _ => Some((entity, score)),
                });
            match best {
                Some((entity, _)) => {
                    if !additive {
                        Self::clear_except(commands, ctx, &[entity]);
                    }
                    commands.entity(entity).insert(IsSelected);
                }
                None if !additive => Self::clear_except(commands, ctx, &[]),
                None => {}
            }
        } else {
            let picked: Vec<Entity> = hits.iter().map(|(entity, _)| *entity).collect();
            if !additive {
                Self::clear_except(commands, ctx, &picked);
            }
            for entity in picked {
                commands.entity(entity).insert(IsSelected);
            }
        }
    }
}

// ============================================================================
// SET RALLY / DEBUG
// ============================================================================

/// Points the rally of every selected production building at a position.
///
/// Only the rally is written; the production timer keeps whatever progress
/// the producer made this tick.
pub struct SetRallyHandler;

impl CommandHandler for SetRallyHandler {
    fn handle(&self, commands: &mut Commands, command: &GameCommand, ctx: &CommandContext, _dt: f32) {
        let GameCommand::SetRally { position } = *command else {
            return;
        };
        let rally = RallyPoint::at(position);
        for entity in ctx.producers.iter() {
            commands.entity(entity).queue(move |entity: Entity, world: &mut World| {
                if let Some(mut production) = world.get_mut::<AutoProduction>(entity) {
                    production.rally = rally;
                }
            });
        }
    }
}

/// Flips the debug overlays. Applied to the live settings, so two toggles in
/// one tick cancel out.
pub struct ToggleDebugHandler;

impl CommandHandler for ToggleDebugHandler {
    fn handle(&self, commands: &mut Commands, command: &GameCommand, _ctx: &CommandContext, _dt: f32) {
        if !matches!(command, GameCommand::ToggleDebug) {
            return;
        }
        commands.queue(|world: &mut World| {
            let mut debug = world.get_resource_or_insert_with(DebugSettings::default);
            debug.show_flow_field = !debug.show_flow_field;
            debug.show_colliders = !debug.show_colliders;
        });
    }
}
