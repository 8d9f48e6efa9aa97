//! Movement systems - steer velocities around bodies, then integrate.

use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::collision::calculate_collision;
use crate::components::{BodyCollider, BodyShape, Disabled, IsDying, Position, Velocity};
use crate::spatial::SpatialGrid;
use crate::systems::performance::SimConfig;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DeltaTime(pub f32);

/// Contacts shallower than this are ignored.
const MIN_PENETRATION: f32 = 0.1;

/// Removes the part of each mover's velocity that drives it into overlapping
/// bodies.
///
/// Contact normals are weighted by the other body's avoidance force and the
/// penetration depth, so units slide along walls and buildings and yield
/// less to each other. Velocities are computed from this tick's positions
/// before any of them are written.
pub fn avoidance_system(
    grid: Res<SpatialGrid>,
    config: Option<Res<SimConfig>>,
    bodies: Query<(&Position, &BodyCollider)>,
    mut movers: Query<(Entity, &Position, &BodyCollider, &mut Velocity), (Without<Disabled>, Without<IsDying>)>,
) {
    let radius = config.map_or(SimConfig::default().avoidance_query_radius, |c| c.avoidance_query_radius);

    for (entity, pos, collider, mut vel) in movers.iter_mut() {
        if collider.shape != BodyShape::Circle {
            continue;
        }

        let mut normal_sum = Vec2::ZERO;
        let mut contacts = 0usize;
        for entry in grid.query_radius(collider.center(pos.0), radius) {
            if entry.entity == entity {
                continue;
            }
            let Ok((other_pos, other_collider)) = bodies.get(entry.entity) else {
                continue;
            };
            let hit = calculate_collision(pos.0, collider, other_pos.0, other_collider);
            if !hit.has_collision || hit.penetration < MIN_PENETRATION {
                continue;
            }
            normal_sum += hit.normal * other_collider.avoidance_force * (1.0 + hit.penetration);
            contacts += 1;
        }

        if contacts == 0 {
            continue;
        }
        let normal = normal_sum.normalize_or_zero();
        let into = vel.0.dot(normal);
        if into < 0.0 {
            vel.0 -= normal * into;
        }
    }
}

/// System that applies velocity to position.
pub fn movement_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&mut Position, &Velocity), (Without<Disabled>, Without<IsDying>)>,
) {
    let delta = dt.0;
    for (mut pos, vel) in query.iter_mut() {
        if vel.0 != Vec2::ZERO {
            pos.0 += vel.0 * delta;
        }
    }
}
