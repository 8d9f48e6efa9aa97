//! Public API for the simulation.
//!
//! [`SimWorld`] is the interface a game shell (renderer, UI, tools) uses to
//! drive the simulation: load a map, spawn entities, push commands through
//! the [`GameBridge`] and read back [`RenderSnapshot`]s.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz). When
//! `step(dt)` is called, the simulation accumulates time and runs fixed
//! updates as needed. This ensures deterministic behavior regardless of
//! frame rate.
//!
//! ## Deferred Mutation
//!
//! The schedule is built without automatic sync points. Structural changes
//! queued by any system (spawns, tags, pooled deaths, command results) are
//! applied together once the last system has run, so every system in a tick
//! observes the same world and the next tick observes all of them.

use std::time::Instant;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ScheduleBuildSettings;
use bevy_ecs::system::SystemState;
use glam::Vec2;
use tracing::{debug, info};

use crate::components::EntityType;
use crate::config::{DebugSettings, GameSettings};
use crate::error::Result;
use crate::factory::{BuildContext, BuilderRegistry, EntityPool, Spawner};
use crate::input::{command_dispatch_system, cursor_detect_system, CommandRegistry, GameBridge, HoverState, InputSnapshot};
use crate::navigation::FlowFieldManager;
use crate::profiler::Profiler;
use crate::spatial::{grid_build_system, SpatialGrid};
use crate::systems::*;
use crate::tilemap::{despawn_map_obstacles, spawn_map_obstacles, TileMap};
use crate::world::RenderSnapshot;

/// The main simulation world container.
///
/// Holds the ECS world, the fixed schedule and the input bridge.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    bridge: GameBridge,
    profiler: Profiler,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a simulation with default configuration and no map loaded.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a simulation with default configuration on `map`.
    pub fn with_map(map: TileMap) -> Self {
        let mut sim = Self::new();
        sim.load_map(map);
        sim
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();

        // Core resources
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SpatialGrid::new(config.grid_cell_size));
        world.insert_resource(SimTick(0));
        world.insert_resource(TileMap::default());
        world.insert_resource(FlowFieldManager::default());

        // Content
        world.insert_resource(GameSettings::default());
        world.insert_resource(BuilderRegistry::with_default_builders());
        world.insert_resource(EntityPool::default());

        // Input
        world.insert_resource(CommandRegistry::with_default_handlers());
        world.insert_resource(InputSnapshot::default());
        world.insert_resource(HoverState::default());
        world.insert_resource(DebugSettings::default());

        info!(
            fixed_timestep = config.fixed_timestep,
            cell_size = config.grid_cell_size,
            "Simulation created"
        );
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.set_build_settings(ScheduleBuildSettings {
            auto_insert_apply_deferred: false,
            ..Default::default()
        });
        schedule.add_systems(
            (
                death_system,
                grid_build_system,
                cursor_detect_system,
                ai_system,
                command_dispatch_system,
                auto_production_system,
                animation_system,
                avoidance_system,
                movement_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            bridge: GameBridge::new(),
            profiler: Profiler::new(),
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Replace the tile map. Rebinds the flow field cache and rebuilds the
    /// static obstacle entities.
    pub fn load_map(&mut self, map: TileMap) {
        self.world.resource::<FlowFieldManager>().initialize(&map);
        info!(width = map.width, height = map.height, tile_size = map.tile_size, "Loading map");
        self.world.insert_resource(map);
        despawn_map_obstacles(&mut self.world);
        spawn_map_obstacles(&mut self.world);
    }

    /// Replace the unit/animation tables.
    pub fn set_settings(&mut self, settings: GameSettings) {
        self.world.insert_resource(settings);
    }

    /// Load unit/animation tables from a JSON file.
    pub fn load_settings_file(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let settings = GameSettings::from_json_file(path)?;
        self.set_settings(settings);
        Ok(())
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. Returns how many fixed updates ran.
    pub fn step(&mut self, dt: f32) -> usize {
        let fixed_dt = self.fixed_timestep();

        self.time_accumulator += dt;

        let mut ticks = 0;
        while self.time_accumulator >= fixed_dt {
            self.tick();
            self.time_accumulator -= fixed_dt;
            ticks += 1;
        }
        ticks
    }

    /// Run exactly one fixed update: capture input, run every system, apply
    /// deferred changes.
    pub fn tick(&mut self) {
        let start = Instant::now();
        let dt = self.fixed_timestep();

        let input = self.bridge.capture_snapshot();
        if !input.commands.is_empty() {
            debug!(count = input.commands.len(), tick = self.tick + 1, "Captured commands");
        }
        self.world.insert_resource(input);
        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.world.resource_mut::<SimTick>().increment();

        self.profiler
            .time_section("schedule", || self.schedule.run(&mut self.world));

        self.tick += 1;
        self.time += dt;

        let lag_ms = self
            .world
            .get_resource::<SimConfig>()
            .map_or(16.0, |c| c.lag_warning_ms);
        self.profiler.record_tick(self.tick, start.elapsed(), lag_ms);
    }

    fn fixed_timestep(&self) -> f32 {
        self.world
            .get_resource::<SimConfig>()
            .map(|c| c.fixed_timestep)
            .unwrap_or(1.0 / 60.0)
    }

    /// Build a `kind` entity at `position` for `team`, reusing a pooled one
    /// when available. `None` when no builder is registered for the type.
    pub fn spawn(&mut self, kind: EntityType, position: Vec2, team: u32) -> Option<Entity> {
        let mut state: SystemState<Spawner> = SystemState::new(&mut self.world);
        let entity = state
            .get_mut(&mut self.world)
            .spawn(kind, &BuildContext::new(position, team));
        state.apply(&mut self.world);
        entity
    }

    /// Get a render snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> RenderSnapshot {
        let max_items = self
            .world
            .get_resource::<SimConfig>()
            .map_or(usize::MAX, |c| c.max_render_items);
        RenderSnapshot::from_world(&mut self.world, self.tick, self.time, max_items)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> Result<String> {
        self.snapshot().to_json()
    }

    /// Input endpoint. Clone it to feed commands from another thread.
    pub fn bridge(&self) -> &GameBridge {
        &self.bridge
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Get the spatial grid reference (for debugging/visualization).
    pub fn spatial_grid(&self) -> Option<&SpatialGrid> {
        self.world.get_resource::<SpatialGrid>()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
