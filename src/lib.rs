//! Skirmish - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation for a real-time strategy
//! game: flow-field navigation, local avoidance, behavior-tree combat AI,
//! production and a thread-safe command pipeline.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod behavior;
pub mod collision;
pub mod components;
pub mod config;
pub mod error;
pub mod factory;
pub mod input;
pub mod navigation;
pub mod profiler;
pub mod render_bridge;
pub mod spatial;
pub mod systems;
pub mod tilemap;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::{DebugSettings, GameSettings};
pub use error::{Result, SimError};
pub use input::{GameBridge, GameCommand};
pub use navigation::{FlowField, FlowFieldManager, FormationKind};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use tilemap::{TileKind, TileMap};
pub use world::{RenderItem, RenderSnapshot};
