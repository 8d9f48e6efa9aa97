//! ECS systems for the skirmish simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick Order
//!
//! One fixed update runs these systems strictly in sequence:
//!
//! 1. `death_system` - tags the newly dead, pools finished corpses
//! 2. `grid_build_system` - rebuilds the spatial grid
//! 3. `cursor_detect_system` - hover detection under the mouse
//! 4. `ai_system` - behavior trees (exclusive world access)
//! 5. `command_dispatch_system` - player commands from the input snapshot
//! 6. `auto_production_system` - factory timers and spawns
//! 7. `animation_system` - sprite clip playback
//! 8. `avoidance_system` - cancels velocity into overlapping bodies
//! 9. `movement_system` - integrates velocity into position
//!
//! Deferred `Commands` from every system are applied together after the
//! last one, in the order above.

pub mod ai;
pub mod animation;
pub mod combat;
pub mod movement;
pub mod performance;
pub mod production;
pub mod serialization;

pub use ai::ai_system;
pub use animation::animation_system;
pub use combat::death_system;
pub use movement::{avoidance_system, movement_system, DeltaTime};
pub use performance::{SimConfig, SimTick};
pub use production::{auto_production_system, SPAWN_OFFSET};
pub use serialization::*;
