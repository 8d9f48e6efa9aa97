//! Death handling - dying animations and returning corpses to the pool.
//!
//! Damage itself is dealt by the `Attack` behavior node; this system only
//! reacts to health reaching zero.

use bevy_ecs::prelude::*;
use glam::Vec2;
use tracing::debug;

use crate::components::*;
use crate::config::GameSettings;
use crate::factory::EntityPool;

/// Starts the death of every newly dead entity and pools those whose death
/// animation has finished.
///
/// A dead entity is tagged [`IsDying`] and plays its dying clip; when the
/// type has no such clip its animation is stopped so it is pooled on the
/// next pass.
pub fn death_system(
    mut commands: Commands,
    mut pool: ResMut<EntityPool>,
    settings: Res<GameSettings>,
    dying: Query<
        (Entity, Option<&AnimationState>, Option<&EntityClass>, Option<&BuildingClass>),
        (With<IsDying>, Without<Disabled>),
    >,
    mut living: Query<
        (Entity, &Health, Option<&mut AnimationState>, Option<&mut Velocity>),
        (Without<IsDying>, Without<Disabled>),
    >,
) {
    for (entity, anim, unit, building) in dying.iter() {
        if anim.is_some_and(|anim| anim.active) {
            continue;
        }
        match unit.map(|c| c.0).or(building.map(|c| c.0)) {
            Some(kind) => pool.despawn(&mut commands, entity, kind),
            None => commands.entity(entity).despawn(),
        }
    }

    for (entity, health, anim, velocity) in living.iter_mut() {
        if health.is_alive() {
            continue;
        }
        commands.entity(entity).insert(IsDying);
        if let Some(mut velocity) = velocity {
            velocity.0 = Vec2::ZERO;
        }
        if let Some(mut anim) = anim {
            let direction = anim.direction;
            if !anim.switch(&settings, AnimationKind::Dying, direction) {
                anim.active = false;
            }
        }
        debug!(?entity, "Entity died");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(EntityPool::default());
        world.insert_resource(GameSettings::default());
        world
    }

    fn run(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(death_system);
        schedule.run(world);
    }

    fn unit(world: &mut World, hp: f32) -> Entity {
        let mut anim = AnimationState::empty(EntityType::Infantry);
        anim.switch(&GameSettings::default(), AnimationKind::Idle, Direction::South);
        world
            .spawn((
                Health { current: hp, max: 100.0 },
                anim,
                Velocity(Vec2::ONE),
                EntityClass(EntityType::Infantry),
            ))
            .id()
    }

    #[test]
    fn test_dead_unit_starts_dying() {
        let mut world = world();
        let alive = unit(&mut world, 50.0);
        let dead = unit(&mut world, 0.0);
        run(&mut world);

        assert!(world.get::<IsDying>(alive).is_none());
        assert!(world.get::<IsDying>(dead).is_some());
        assert_eq!(world.get::<AnimationState>(dead).unwrap().kind, AnimationKind::Dying);
        assert_eq!(world.get::<Velocity>(dead).unwrap().0, Vec2::ZERO);
    }

    #[test]
    fn test_unit_is_pooled_after_animation() {
        let mut world = world();
        let dead = unit(&mut world, 0.0);
        run(&mut world);

        // Still animating: stays dying
        run(&mut world);
        assert!(world.get::<Disabled>(dead).is_none());

        world.get_mut::<AnimationState>(dead).unwrap().active = false;
        run(&mut world);
        assert!(world.get::<Disabled>(dead).is_some());
        assert!(world.get::<IsDying>(dead).is_none());
        assert_eq!(world.resource::<EntityPool>().len(EntityType::Infantry), 1);
    }

    #[test]
    fn test_missing_dying_clip_finishes_immediately() {
        let mut world = world();
        world.insert_resource(GameSettings::empty());
        let dead = unit(&mut world, 0.0);
        run(&mut world);
        assert!(!world.get::<AnimationState>(dead).unwrap().active);

        run(&mut world);
        assert!(world.get::<Disabled>(dead).is_some());
    }

    #[test]
    fn test_untyped_corpse_is_despawned() {
        let mut world = world();
        let dead = world.spawn(Health { current: 0.0, max: 1.0 }).id();
        run(&mut world);
        run(&mut world);
        assert!(!world.entities().contains(dead));
    }
}
