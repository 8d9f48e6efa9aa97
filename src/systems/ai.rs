//! AI system: runs every unit's behavior tree once per tick.
//!
//! Trees need random access to other entities (targets, the spatial grid,
//! settings), so this is an exclusive system over the whole [`World`].
//! Entities are evaluated in query order, which is stable for a given
//! spawn history, keeping runs reproducible.

use std::sync::Arc;

use bevy_ecs::prelude::*;

use crate::behavior::{AiController, BehaviorContext, BehaviorNode};
use crate::components::{Disabled, Health, IsDying};
use crate::systems::movement::DeltaTime;

/// Evaluate the behavior tree of every active, living AI entity.
///
/// An entity killed earlier in the same pass is skipped; the death system
/// picks it up next tick.
pub fn ai_system(world: &mut World) {
    let dt = world.get_resource::<DeltaTime>().map_or(0.0, |dt| dt.0);

    let agents: Vec<(Entity, Arc<dyn BehaviorNode>)> = world
        .query_filtered::<(Entity, &AiController, Option<&Health>), (Without<Disabled>, Without<IsDying>)>()
        .iter(world)
        .filter(|(_, _, health)| health.map_or(true, Health::is_alive))
        .map(|(entity, ai, _)| (entity, Arc::clone(&ai.root)))
        .collect();

    let mut ctx = BehaviorContext { world, dt };
    for (entity, root) in agents {
        if ctx.world.get::<Health>(entity).is_some_and(Health::is_dead) {
            continue;
        }
        root.execute(&mut ctx, entity);
    }
}
