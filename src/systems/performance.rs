//! Simulation tuning knobs and the global tick counter.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::navigation::FormationKind;
use crate::spatial::DEFAULT_CELL_SIZE;

/// Configuration for simulation timing and performance tuning.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/60 = 0.0167 for 60 Hz).
    pub fixed_timestep: f32,
    /// Edge of a spatial grid cell in world units.
    pub grid_cell_size: f32,
    /// Neighbor search radius around a mover during avoidance.
    pub avoidance_query_radius: f32,
    /// A tick slower than this many milliseconds logs a warning.
    pub lag_warning_ms: f32,
    /// Team of the local player; hovering anything else shows as hostile.
    pub local_team: u32,
    /// Slot layout for group move orders.
    pub formation: FormationKind,
    /// Render snapshot size cap. Items past the cap are dropped.
    pub max_render_items: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0, // 60 Hz
            grid_cell_size: DEFAULT_CELL_SIZE,
            avoidance_query_radius: 300.0,
            lag_warning_ms: 16.0,
            local_team: 0,
            formation: FormationKind::Rectangle,
            max_render_items: 20_000,
        }
    }
}

/// Global simulation tick counter.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(config.grid_cell_size, 100.0);
        assert_eq!(config.formation, FormationKind::Rectangle);
    }

    #[test]
    fn test_partial_config_json_keeps_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{ "local_team": 2, "formation": "Spiral" }"#).unwrap();
        assert_eq!(config.local_team, 2);
        assert_eq!(config.formation, FormationKind::Spiral);
        assert_eq!(config.avoidance_query_radius, 300.0);
    }

    #[test]
    fn test_tick_increment() {
        let mut tick = SimTick::default();
        tick.increment();
        tick.increment();
        assert_eq!(tick, SimTick(2));
    }
}
