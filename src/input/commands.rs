//! Player commands accepted by the simulation.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A player intent, queued from any thread and handled on the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameCommand {
    /// Move the selected units to `target` in formation.
    Navigate { target: Vec2 },
    /// Click (`start` close to `end`) or box selection.
    Select { start: Vec2, end: Vec2, additive: bool },
    /// Set the rally point of the selected production buildings.
    SetRally { position: Vec2 },
    /// Flip the renderer debug overlays.
    ToggleDebug,
}

impl GameCommand {
    /// Stable name used to look up the handler.
    pub fn kind(&self) -> &'static str {
        match self {
            GameCommand::Navigate { .. } => "Navigate",
            GameCommand::Select { .. } => "Select",
            GameCommand::SetRally { .. } => "SetRally",
            GameCommand::ToggleDebug => "ToggleDebug",
        }
    }
}
