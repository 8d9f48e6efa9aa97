//! Leaf nodes for unit behavior trees.
//!
//! Leaves read and write components of the entity they run for. Enemy
//! lookups go through the [`SpatialGrid`] built earlier in the tick; its
//! entries are collected before any component is written.

use bevy_ecs::prelude::*;
use glam::Vec2;

use super::{BehaviorContext, BehaviorNode, NodeStatus};
use crate::components::{
    AnimationKind, AnimationState, AttackTarget, BodyCollider, CombatStats, Destination, Direction,
    Disabled, Facing, FlowFieldRef, Health, IsDying, MoveSpeed, Position, TeamId, Velocity,
};
use crate::config::GameSettings;
use crate::spatial::SpatialGrid;

/// Inside this distance a unit walks straight at its destination.
pub const NEAR_RANGE: f32 = 70.0;

/// Extra grid search radius so large bodies whose center lies outside the
/// range but whose edge is inside are still found.
const TARGET_QUERY_MARGIN: f32 = 200.0;

// ============================================================================
// HELPERS
// ============================================================================

fn position(world: &World, entity: Entity) -> Option<Vec2> {
    world.get::<Position>(entity).map(|p| p.0)
}

/// Collider center, or the plain position for bodiless entities.
fn body_center(world: &World, entity: Entity) -> Option<Vec2> {
    let pos = position(world, entity)?;
    Some(match world.get::<BodyCollider>(entity) {
        Some(collider) => collider.center(pos),
        None => pos,
    })
}

/// Distance from `from` to the edge of `target`'s body.
fn reach_distance(world: &World, from: Vec2, target: Entity) -> Option<f32> {
    let pos = position(world, target)?;
    let (center, radius) = match world.get::<BodyCollider>(target) {
        Some(collider) => (collider.center(pos), collider.bounding_radius()),
        None => (pos, 0.0),
    };
    Some((from.distance(center) - radius).max(0.0))
}

/// Alive, active and not already dying.
fn is_valid_target(world: &World, target: Entity) -> bool {
    is_active(world, target) && world.get::<Health>(target).is_some_and(Health::is_alive)
}

/// Exists, is not pooled and is not dying.
fn is_active(world: &World, target: Entity) -> bool {
    world.entities().contains(target) && world.get::<Disabled>(target).is_none() && world.get::<IsDying>(target).is_none()
}

fn is_hostile(world: &World, target: Entity, team: TeamId) -> bool {
    world.get::<TeamId>(target).is_some_and(|other| *other != team) && is_valid_target(world, target)
}

/// Nearest hostile whose body edge is within `range` of `from`.
fn nearest_enemy(world: &World, entity: Entity, from: Vec2, team: TeamId, range: f32) -> Option<Entity> {
    let grid = world.get_resource::<SpatialGrid>()?;
    let mut best: Option<(f32, Entity)> = None;
    for entry in grid.query_radius(from, range + TARGET_QUERY_MARGIN) {
        if entry.entity == entity || !is_hostile(world, entry.entity, team) {
            continue;
        }
        let Some(gap) = reach_distance(world, from, entry.entity) else {
            continue;
        };
        if gap <= range && best.map_or(true, |(best_gap, _)| gap < best_gap) {
            best = Some((gap, entry.entity));
        }
    }
    best.map(|(_, target)| target)
}

fn current_target(world: &World, entity: Entity) -> Option<Entity> {
    world.get::<AttackTarget>(entity).and_then(|t| t.0)
}

fn set_target(world: &mut World, entity: Entity, target: Option<Entity>) {
    if let Some(mut slot) = world.get_mut::<AttackTarget>(entity) {
        slot.0 = target;
    }
}

fn set_velocity(world: &mut World, entity: Entity, velocity: Vec2) {
    if let Some(mut slot) = world.get_mut::<Velocity>(entity) {
        slot.0 = velocity;
    }
}

/// Face `direction` and play the matching clip.
fn play(world: &mut World, entity: Entity, kind: AnimationKind, direction: Direction) {
    if let Some(mut facing) = world.get_mut::<Facing>(entity) {
        facing.0 = direction;
    }
    let Some(mut anim) = world.get::<AnimationState>(entity).copied() else {
        return;
    };
    let Some(settings) = world.get_resource::<GameSettings>() else {
        return;
    };
    if anim.switch(settings, kind, direction) {
        if let Some(mut slot) = world.get_mut::<AnimationState>(entity) {
            *slot = anim;
        }
    }
}

// ============================================================================
// MOVEMENT
// ============================================================================

/// Follows the active move order.
///
/// Far from the goal the unit follows its shared flow field; near its own
/// slot it walks straight there. Fails when there is no active order.
pub struct Navigation;

impl BehaviorNode for Navigation {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        let world = &mut *ctx.world;
        let (Some(pos), Some(mut dest)) = (position(world, entity), world.get::<Destination>(entity).copied())
        else {
            return NodeStatus::Failure;
        };
        if !dest.active {
            return NodeStatus::Failure;
        }

        let to_target = dest.target - pos;
        if to_target.length_squared() <= dest.stop_distance_sq {
            dest.active = false;
            if let Some(mut slot) = world.get_mut::<Destination>(entity) {
                *slot = dest;
            }
            if let Some(mut slot) = world.get_mut::<Position>(entity) {
                slot.0 = dest.target;
            }
            if let Some(mut flow) = world.get_mut::<FlowFieldRef>(entity) {
                *flow = FlowFieldRef::default();
            }
            set_velocity(world, entity, Vec2::ZERO);
            return NodeStatus::Success;
        }

        let direct = to_target.normalize_or_zero();
        let offset = world.get::<BodyCollider>(entity).map_or(Vec2::ZERO, |c| c.offset);
        let field = world.get::<FlowFieldRef>(entity).and_then(FlowFieldRef::resolve);
        let direction = match field {
            Some(field) => {
                // Slots around the clicked point sit beside the field's goal
                // tile; once as close to that goal as its own slot, a unit
                // stops following the shared field.
                let goal = field.target_center();
                let arrival = dest.target.distance(goal) + NEAR_RANGE;
                if to_target.length() <= NEAR_RANGE || pos.distance(goal) <= arrival {
                    direct
                } else {
                    let flow = field.flow_direction(pos + offset);
                    if flow == Vec2::ZERO {
                        direct
                    } else {
                        flow
                    }
                }
            }
            None => direct,
        };

        let speed = world.get::<MoveSpeed>(entity).map_or(0.0, |s| s.0);
        set_velocity(world, entity, direction * speed);
        play(world, entity, AnimationKind::Running, Direction::from_vector(direction));
        NodeStatus::Success
    }
}

/// Closes in on the current target until it is within attack range.
pub struct MoveToAttackRange;

impl BehaviorNode for MoveToAttackRange {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        let world = &mut *ctx.world;
        let Some(target) = current_target(world, entity).filter(|t| is_valid_target(world, *t)) else {
            return NodeStatus::Failure;
        };
        let (Some(from), Some(stats), Some(target_center)) = (
            body_center(world, entity),
            world.get::<CombatStats>(entity).copied(),
            body_center(world, target),
        ) else {
            return NodeStatus::Failure;
        };
        let Some(gap) = reach_distance(world, from, target) else {
            return NodeStatus::Failure;
        };

        if gap <= stats.attack_range {
            set_velocity(world, entity, Vec2::ZERO);
            return NodeStatus::Success;
        }

        let direction = (target_center - from).normalize_or_zero();
        let speed = world.get::<MoveSpeed>(entity).map_or(0.0, |s| s.0);
        set_velocity(world, entity, direction * speed);
        play(world, entity, AnimationKind::Running, Direction::from_vector(direction));
        NodeStatus::Running
    }
}

/// Stands still.
pub struct Idle;

impl BehaviorNode for Idle {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        set_velocity(ctx.world, entity, Vec2::ZERO);
        play(ctx.world, entity, AnimationKind::Idle, Direction::South);
        NodeStatus::Success
    }
}

// ============================================================================
// TARGETING
// ============================================================================

/// Keeps a live target, or picks the nearest enemy within vision.
pub struct AggressiveSearchTarget;

impl BehaviorNode for AggressiveSearchTarget {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        let world = &mut *ctx.world;
        if current_target(world, entity).is_some_and(|t| is_valid_target(world, t)) {
            return NodeStatus::Success;
        }

        let (Some(from), Some(team), Some(stats)) = (
            body_center(world, entity),
            world.get::<TeamId>(entity).copied(),
            world.get::<CombatStats>(entity).copied(),
        ) else {
            return NodeStatus::Failure;
        };

        let found = nearest_enemy(world, entity, from, team, stats.vision_range);
        set_target(world, entity, found);
        if found.is_some() {
            NodeStatus::Success
        } else {
            NodeStatus::Failure
        }
    }
}

/// Succeeds when there is a live target within attack range.
///
/// An out-of-reach target is kept (the movement branch may be chasing it)
/// but another enemy already in reach is preferred.
pub struct CheckTarget;

impl BehaviorNode for CheckTarget {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        let world = &mut *ctx.world;
        let (Some(from), Some(team), Some(stats)) = (
            body_center(world, entity),
            world.get::<TeamId>(entity).copied(),
            world.get::<CombatStats>(entity).copied(),
        ) else {
            return NodeStatus::Failure;
        };

        let held = current_target(world, entity);
        let held_valid = held.filter(|t| is_hostile(world, *t, team));
        if let Some(target) = held_valid {
            if reach_distance(world, from, target).is_some_and(|gap| gap <= stats.attack_range) {
                return NodeStatus::Success;
            }
        }

        match nearest_enemy(world, entity, from, team, stats.attack_range) {
            Some(target) => {
                set_target(world, entity, Some(target));
                NodeStatus::Success
            }
            None => {
                if held.is_some() && held_valid.is_none() {
                    set_target(world, entity, None);
                }
                NodeStatus::Failure
            }
        }
    }
}

// ============================================================================
// COMBAT
// ============================================================================

/// Hits the current target whenever the attack cooldown has elapsed.
pub struct Attack;

impl BehaviorNode for Attack {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        let dt = ctx.dt;
        let world = &mut *ctx.world;
        let Some(target) = current_target(world, entity) else {
            return NodeStatus::Failure;
        };
        let Some(mut stats) = world.get::<CombatStats>(entity).copied() else {
            return NodeStatus::Failure;
        };
        if !is_active(world, target) {
            set_target(world, entity, None);
            return NodeStatus::Failure;
        }

        stats.cooldown -= dt;
        let status = if stats.cooldown > 0.0 {
            NodeStatus::Running
        } else if world.get::<Health>(target).map_or(true, Health::is_dead) {
            stats.cooldown = 0.0;
            set_target(world, entity, None);
            NodeStatus::Failure
        } else {
            if let Some(mut health) = world.get_mut::<Health>(target) {
                health.damage(stats.attack_damage);
            }
            stats.cooldown = stats.attack_interval;
            let facing = match (position(world, entity), position(world, target)) {
                (Some(from), Some(to)) => Direction::from_vector(to - from),
                _ => Direction::South,
            };
            play(world, entity, AnimationKind::Attacking, facing);
            NodeStatus::Success
        };

        if let Some(mut slot) = world.get_mut::<CombatStats>(entity) {
            *slot = stats;
        }
        status
    }
}

/// Always succeeds. Placeholder branch for trees under construction.
pub struct Succeed;

impl BehaviorNode for Succeed {
    fn execute(&self, _ctx: &mut BehaviorContext<'_>, _entity: Entity) -> NodeStatus {
        NodeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::EntityType;

    fn world_with_grid() -> World {
        let mut world = World::new();
        world.insert_resource(SpatialGrid::default());
        world.insert_resource(GameSettings::default());
        world
    }

    fn spawn_soldier(world: &mut World, pos: Vec2, team: u32, hp: f32) -> Entity {
        world
            .spawn((
                Position(pos),
                Velocity::default(),
                MoveSpeed(100.0),
                BodyCollider::circle(10.0, Vec2::ZERO, 40.0),
                TeamId(team),
                Health::new(hp),
                CombatStats {
                    attack_damage: 10.0,
                    attack_range: 50.0,
                    attack_interval: 1.0,
                    cooldown: 0.0,
                    vision_range: 300.0,
                },
                AttackTarget::default(),
                Facing::default(),
                AnimationState::empty(EntityType::Infantry),
            ))
            .id()
    }

    fn rebuild_grid(world: &mut World) {
        let entries: Vec<(Entity, Vec2)> = world
            .query::<(Entity, &Position, &BodyCollider)>()
            .iter(world)
            .map(|(e, p, c)| (e, c.center(p.0)))
            .collect();
        let mut grid = world.resource_mut::<SpatialGrid>();
        grid.clear();
        for (entity, pos) in entries {
            grid.insert(entity, pos);
        }
    }

    fn run(world: &mut World, node: &dyn BehaviorNode, entity: Entity, dt: f32) -> NodeStatus {
        let mut ctx = BehaviorContext { world, dt };
        node.execute(&mut ctx, entity)
    }

    #[test]
    fn test_search_picks_nearest_enemy_within_vision() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let _friend = spawn_soldier(&mut world, Vec2::new(20.0, 0.0), 0, 100.0);
        let near = spawn_soldier(&mut world, Vec2::new(150.0, 0.0), 1, 100.0);
        let _far = spawn_soldier(&mut world, Vec2::new(250.0, 0.0), 1, 100.0);
        let _out_of_sight = spawn_soldier(&mut world, Vec2::new(900.0, 0.0), 1, 100.0);
        rebuild_grid(&mut world);

        assert_eq!(run(&mut world, &AggressiveSearchTarget, me, 0.1), NodeStatus::Success);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, Some(near));
    }

    #[test]
    fn test_search_fails_without_enemies() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        spawn_soldier(&mut world, Vec2::new(900.0, 0.0), 1, 100.0);
        rebuild_grid(&mut world);

        assert_eq!(run(&mut world, &AggressiveSearchTarget, me, 0.1), NodeStatus::Failure);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, None);
    }

    #[test]
    fn test_search_ignores_dying_enemies() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let dying = spawn_soldier(&mut world, Vec2::new(100.0, 0.0), 1, 100.0);
        world.entity_mut(dying).insert(IsDying);
        rebuild_grid(&mut world);

        assert_eq!(run(&mut world, &AggressiveSearchTarget, me, 0.1), NodeStatus::Failure);
    }

    #[test]
    fn test_move_to_attack_range_chases_then_stops() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let enemy = spawn_soldier(&mut world, Vec2::new(200.0, 0.0), 1, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(enemy);

        assert_eq!(run(&mut world, &MoveToAttackRange, me, 0.1), NodeStatus::Running);
        assert_eq!(world.get::<Velocity>(me).unwrap().0, Vec2::new(100.0, 0.0));
        assert_eq!(world.get::<Facing>(me).unwrap().0, Direction::East);

        // Edge of the enemy body is 45 away: inside the 50 range
        world.get_mut::<Position>(me).unwrap().0 = Vec2::new(145.0, 0.0);
        assert_eq!(run(&mut world, &MoveToAttackRange, me, 0.1), NodeStatus::Success);
        assert_eq!(world.get::<Velocity>(me).unwrap().0, Vec2::ZERO);
    }

    #[test]
    fn test_check_target_switches_to_enemy_in_reach() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let far = spawn_soldier(&mut world, Vec2::new(250.0, 0.0), 1, 100.0);
        let close = spawn_soldier(&mut world, Vec2::new(40.0, 0.0), 1, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(far);
        rebuild_grid(&mut world);

        assert_eq!(run(&mut world, &CheckTarget, me, 0.1), NodeStatus::Success);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, Some(close));
    }

    #[test]
    fn test_check_target_keeps_valid_target_out_of_reach() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let far = spawn_soldier(&mut world, Vec2::new(250.0, 0.0), 1, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(far);
        rebuild_grid(&mut world);

        assert_eq!(run(&mut world, &CheckTarget, me, 0.1), NodeStatus::Failure);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, Some(far));
    }

    #[test]
    fn test_check_target_drops_friendly_target() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let friend = spawn_soldier(&mut world, Vec2::new(30.0, 0.0), 0, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(friend);
        rebuild_grid(&mut world);

        assert_eq!(run(&mut world, &CheckTarget, me, 0.1), NodeStatus::Failure);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, None);
    }

    #[test]
    fn test_attack_respects_cooldown() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let enemy = spawn_soldier(&mut world, Vec2::new(30.0, 0.0), 1, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(enemy);

        assert_eq!(run(&mut world, &Attack, me, 0.25), NodeStatus::Success);
        assert_eq!(world.get::<Health>(enemy).unwrap().current, 90.0);
        assert_eq!(world.get::<CombatStats>(me).unwrap().cooldown, 1.0);
        assert_eq!(world.get::<AnimationState>(me).unwrap().kind, AnimationKind::Attacking);

        for _ in 0..3 {
            assert_eq!(run(&mut world, &Attack, me, 0.25), NodeStatus::Running);
        }
        assert_eq!(world.get::<Health>(enemy).unwrap().current, 90.0);

        assert_eq!(run(&mut world, &Attack, me, 0.25), NodeStatus::Success);
        assert_eq!(world.get::<Health>(enemy).unwrap().current, 80.0);
    }

    #[test]
    fn test_attack_clears_dead_target() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let enemy = spawn_soldier(&mut world, Vec2::new(30.0, 0.0), 1, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(enemy);
        world.get_mut::<Health>(enemy).unwrap().current = 0.0;

        assert_eq!(run(&mut world, &Attack, me, 0.1), NodeStatus::Failure);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, None);
        assert!(world.get::<CombatStats>(me).unwrap().cooldown >= 0.0);
    }

    #[test]
    fn test_attack_fails_on_despawned_target() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        let enemy = spawn_soldier(&mut world, Vec2::new(30.0, 0.0), 1, 100.0);
        world.get_mut::<AttackTarget>(me).unwrap().0 = Some(enemy);
        world.despawn(enemy);

        assert_eq!(run(&mut world, &Attack, me, 0.1), NodeStatus::Failure);
        assert_eq!(world.get::<AttackTarget>(me).unwrap().0, None);
    }

    #[test]
    fn test_navigation_arrives_and_deactivates() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        world
            .entity_mut(me)
            .insert((Destination::towards(Vec2::new(5.0, 0.0), 100.0), FlowFieldRef::default()));

        assert_eq!(run(&mut world, &Navigation, me, 0.1), NodeStatus::Success);
        assert_eq!(world.get::<Position>(me).unwrap().0, Vec2::new(5.0, 0.0));
        assert!(!world.get::<Destination>(me).unwrap().active);
        assert_eq!(world.get::<Velocity>(me).unwrap().0, Vec2::ZERO);

        // No active order left
        assert_eq!(run(&mut world, &Navigation, me, 0.1), NodeStatus::Failure);
    }

    #[test]
    fn test_navigation_without_field_walks_straight() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        world
            .entity_mut(me)
            .insert((Destination::towards(Vec2::new(0.0, 500.0), 100.0), FlowFieldRef::default()));

        assert_eq!(run(&mut world, &Navigation, me, 0.1), NodeStatus::Success);
        assert_eq!(world.get::<Velocity>(me).unwrap().0, Vec2::new(0.0, 100.0));
        assert_eq!(world.get::<AnimationState>(me).unwrap().kind, AnimationKind::Running);
    }

    #[test]
    fn test_idle_stops_and_faces_south() {
        let mut world = world_with_grid();
        let me = spawn_soldier(&mut world, Vec2::ZERO, 0, 100.0);
        world.get_mut::<Velocity>(me).unwrap().0 = Vec2::ONE;

        assert_eq!(run(&mut world, &Idle, me, 0.1), NodeStatus::Success);
        assert_eq!(world.get::<Velocity>(me).unwrap().0, Vec2::ZERO);
        assert_eq!(world.get::<Facing>(me).unwrap().0, Direction::South);
        assert_eq!(world.get::<AnimationState>(me).unwrap().kind, AnimationKind::Idle);
    }
}
