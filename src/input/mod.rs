//! Player input: the cross-thread bridge, commands, their handlers and
//! hover detection.

pub mod bridge;
pub mod commands;
pub mod cursor;
pub mod handlers;

use bevy_ecs::prelude::*;
use tracing::{debug, warn};

pub use bridge::{GameBridge, InputSnapshot};
pub use commands::GameCommand;
pub use cursor::{cursor_detect_system, HoverKind, HoverState};
pub use handlers::{CommandContext, CommandHandler, CommandRegistry};

use crate::systems::movement::DeltaTime;

/// Route every command captured this tick to its handler, in order.
pub fn command_dispatch_system(
    mut commands: Commands,
    snapshot: Res<InputSnapshot>,
    registry: Res<CommandRegistry>,
    dt: Res<DeltaTime>,
    ctx: CommandContext,
) {
    for command in &snapshot.commands {
        match registry.get(command.kind()) {
            Some(handler) => {
                debug!(kind = command.kind(), "Dispatching command");
                handler.handle(&mut commands, command, &ctx, dt.0);
            }
            None => warn!(kind = command.kind(), "No handler registered for command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::*;
    use crate::config::DebugSettings;
    use crate::navigation::FlowFieldManager;
    use crate::spatial::{grid_build_system, SpatialGrid};
    use crate::systems::performance::SimConfig;
    use crate::tilemap::TileMap;
    use glam::Vec2;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(SpatialGrid::default());
        world.insert_resource(SimConfig::default());
        world.insert_resource(DebugSettings::default());
        world.insert_resource(DeltaTime(1.0 / 60.0));
        world.insert_resource(CommandRegistry::with_default_handlers());
        world.insert_resource(FlowFieldManager::new(&TileMap::new(40, 40, 50.0)));
        world.insert_resource(InputSnapshot::default());
        world
    }

    fn unit(world: &mut World, pos: Vec2) -> Entity {
        world
            .spawn((
                Position(pos),
                BodyCollider::circle(20.0, Vec2::new(0.0, 20.0), 40.0),
                Destination::idle(100.0),
                FlowFieldRef::default(),
                Selectable,
            ))
            .id()
    }

    fn dispatch(world: &mut World, commands: Vec<GameCommand>) {
        world.resource_mut::<InputSnapshot>().commands = commands;
        let mut schedule = Schedule::default();
        schedule.add_systems((grid_build_system, command_dispatch_system).chain());
        schedule.run(world);
    }

    fn select(start: Vec2, end: Vec2, additive: bool) -> GameCommand {
        GameCommand::Select { start, end, additive }
    }

    fn selected(world: &mut World) -> Vec<Entity> {
        let mut selected: Vec<Entity> = world
            .query_filtered::<Entity, With<IsSelected>>()
            .iter(world)
            .collect();
        selected.sort();
        selected
    }

    #[test]
    fn test_box_select_replaces_selection() {
        let mut world = world();
        let a = unit(&mut world, Vec2::new(100.0, 100.0));
        let b = unit(&mut world, Vec2::new(200.0, 100.0));
        let c = unit(&mut world, Vec2::new(800.0, 800.0));
        world.entity_mut(c).insert(IsSelected);

        dispatch(&mut world, vec![select(Vec2::new(50.0, 50.0), Vec2::new(250.0, 150.0), false)]);
        assert_eq!(selected(&mut world), vec![a, b]);
    }

    #[test]
    fn test_additive_box_select_keeps_selection() {
        let mut world = world();
        let a = unit(&mut world, Vec2::new(100.0, 100.0));
        let c = unit(&mut world, Vec2::new(800.0, 800.0));
        world.entity_mut(c).insert(IsSelected);

        dispatch(&mut world, vec![select(Vec2::new(50.0, 50.0), Vec2::new(250.0, 150.0), true)]);
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(selected(&mut world), expected);
    }

    #[test]
    fn test_box_select_skips_buildings() {
        let mut world = world();
        let building = unit(&mut world, Vec2::new(100.0, 100.0));
        world.entity_mut(building).insert(BuildingClass(EntityType::Barracks));

        dispatch(&mut world, vec![select(Vec2::new(50.0, 50.0), Vec2::new(250.0, 150.0), false)]);
        assert!(selected(&mut world).is_empty());

        // A click still picks it
        dispatch(&mut world, vec![select(Vec2::new(100.0, 120.0), Vec2::new(100.0, 121.0), false)]);
        assert_eq!(selected(&mut world), vec![building]);
    }

    #[test]
    fn test_click_prefers_front_unit() {
        let mut world = world();
        let back = unit(&mut world, Vec2::new(100.0, 100.0));
        let front = unit(&mut world, Vec2::new(100.0, 110.0));
        world.entity_mut(back).insert(IsSelected);

        dispatch(&mut world, vec![select(Vec2::new(100.0, 125.0), Vec2::new(100.0, 125.0), false)]);
        assert_eq!(selected(&mut world), vec![front]);
    }

    #[test]
    fn test_click_on_empty_ground_clears() {
        let mut world = world();
        let a = unit(&mut world, Vec2::new(100.0, 100.0));
        world.entity_mut(a).insert(IsSelected);

        dispatch(&mut world, vec![select(Vec2::new(900.0, 900.0), Vec2::new(901.0, 900.0), false)]);
        assert!(selected(&mut world).is_empty());
    }

    #[test]
    fn test_navigate_assigns_formation_slots() {
        let mut world = world();
        let left = unit(&mut world, Vec2::new(100.0, 100.0));
        let right = unit(&mut world, Vec2::new(300.0, 100.0));
        let idle = unit(&mut world, Vec2::new(500.0, 100.0));
        world.entity_mut(left).insert(IsSelected);
        world.entity_mut(right).insert(IsSelected);

        dispatch(&mut world, vec![GameCommand::Navigate { target: Vec2::new(1000.0, 1000.0) }]);

        let left_dest = *world.get::<Destination>(left).unwrap();
        let right_dest = *world.get::<Destination>(right).unwrap();
        assert!(left_dest.active && right_dest.active);
        // Slots are (1000, 1000) and (1070, 1000); left unit takes the left slot
        assert_eq!(left_dest.target, Vec2::new(1000.0, 1000.0));
        assert_eq!(right_dest.target, Vec2::new(1070.0, 1000.0));
        assert_eq!(left_dest.stop_distance_sq, 100.0);
        assert!(world.get::<FlowFieldRef>(left).unwrap().resolve().is_some());
        assert!(!world.get::<Destination>(idle).unwrap().active);
    }

    #[test]
    fn test_navigate_outside_map_is_ignored() {
        let mut world = world();
        let a = unit(&mut world, Vec2::new(100.0, 100.0));
        world.entity_mut(a).insert(IsSelected);

        dispatch(&mut world, vec![GameCommand::Navigate { target: Vec2::new(-500.0, 10.0) }]);
        assert!(!world.get::<Destination>(a).unwrap().active);
    }

    #[test]
    fn test_set_rally_updates_selected_producers() {
        let mut world = world();
        let production = AutoProduction {
            interval: 10.0,
            progress: 3.0,
            product: EntityType::Infantry,
            rally: RallyPoint::default(),
        };
        let picked = world.spawn((production, IsSelected)).id();
        let other = world.spawn(production).id();

        dispatch(&mut world, vec![GameCommand::SetRally { position: Vec2::new(40.0, 50.0) }]);
        let updated = world.get::<AutoProduction>(picked).unwrap();
        assert_eq!(updated.rally, RallyPoint::at(Vec2::new(40.0, 50.0)));
        assert_eq!(updated.progress, 3.0);
        assert!(!world.get::<AutoProduction>(other).unwrap().rally.is_set);
    }

    #[test]
    fn test_toggle_debug_flips_both_flags() {
        let mut world = world();
        dispatch(&mut world, vec![GameCommand::ToggleDebug]);
        let debug = *world.resource::<DebugSettings>();
        assert!(debug.show_flow_field && debug.show_colliders);

        dispatch(&mut world, vec![GameCommand::ToggleDebug]);
        assert!(!world.resource::<DebugSettings>().show_flow_field);
    }

    #[test]
    fn test_two_toggles_in_one_tick_cancel_out() {
        let mut world = world();
        dispatch(&mut world, vec![GameCommand::ToggleDebug, GameCommand::ToggleDebug]);
        let debug = *world.resource::<DebugSettings>();
        assert!(!debug.show_flow_field && !debug.show_colliders);
    }

    #[test]
    fn test_set_rally_leaves_timer_to_producer() {
        let mut world = world();
        let production = AutoProduction {
            interval: 10.0,
            progress: 3.0,
            product: EntityType::Infantry,
            rally: RallyPoint::default(),
        };
        let building = world.spawn((production, IsSelected)).id();

        // Stand-in for the production system running later in the same tick
        fn advance(mut producers: Query<&mut AutoProduction>) {
            for mut production in producers.iter_mut() {
                production.progress += 1.0;
            }
        }

        world.resource_mut::<InputSnapshot>().commands = vec![GameCommand::SetRally { position: Vec2::new(40.0, 50.0) }];
        let mut schedule = Schedule::default();
        schedule.add_systems((grid_build_system, command_dispatch_system, advance).chain());
        schedule.run(&mut world);

        let updated = world.get::<AutoProduction>(building).unwrap();
        assert_eq!(updated.rally, RallyPoint::at(Vec2::new(40.0, 50.0)));
        assert_eq!(updated.progress, 4.0);
    }

    #[test]
    fn test_unknown_command_kind_is_skipped() {
        let mut world = world();
        world.insert_resource(CommandRegistry::default());
        let a = unit(&mut world, Vec2::new(100.0, 100.0));
        world.entity_mut(a).insert(IsSelected);

        dispatch(&mut world, vec![GameCommand::Navigate { target: Vec2::new(500.0, 500.0) }]);
        assert!(!world.get::<Destination>(a).unwrap().active);
    }
}
