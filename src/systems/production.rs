//! Timer-driven unit production.

use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::components::{AutoProduction, Disabled, IsDying, Position, ProductionEnabled, TeamId};
use crate::factory::{BuildContext, Spawner};
use crate::systems::movement::DeltaTime;

/// Produced units appear this far from the building's position.
pub const SPAWN_OFFSET: Vec2 = Vec2::new(0.0, 300.0);

/// Advance every enabled producer and spawn its product when the timer fills.
pub fn auto_production_system(
    dt: Res<DeltaTime>,
    mut spawner: Spawner,
    mut producers: Query<
        (&Position, &TeamId, &mut AutoProduction),
        (With<ProductionEnabled>, Without<Disabled>, Without<IsDying>),
    >,
) {
    for (pos, team, mut production) in producers.iter_mut() {
        production.progress += dt.0;
        if production.progress < production.interval {
            continue;
        }
        production.progress = 0.0;

        let ctx = BuildContext::new(pos.0 + SPAWN_OFFSET, team.0).with_rally(production.rally);
        spawner.spawn(production.product, &ctx);
    }
}
