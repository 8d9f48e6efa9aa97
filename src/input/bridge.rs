//! Thread-safe hand-off between the UI thread and the simulation.
//!
//! The UI pushes commands and mouse updates at any time. Once per tick the
//! engine drains everything queued so far into an [`InputSnapshot`]; systems
//! only ever see that snapshot, never the live bridge.

use std::sync::{Arc, PoisonError, RwLock};

use bevy_ecs::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec2;
use tracing::trace;

use super::commands::GameCommand;

/// Commands and mouse position captured for one tick.
#[derive(Resource, Debug, Clone, Default)]
pub struct InputSnapshot {
    /// In submission order.
    pub commands: Vec<GameCommand>,
    pub mouse_world: Vec2,
}

/// Cloneable producer/consumer endpoint. Every clone shares the same queue.
#[derive(Debug, Clone)]
pub struct GameBridge {
    sender: Sender<GameCommand>,
    receiver: Receiver<GameCommand>,
    mouse: Arc<RwLock<Vec2>>,
}

impl Default for GameBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBridge {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            mouse: Arc::new(RwLock::new(Vec2::ZERO)),
        }
    }

    /// Queue a command for the next tick.
    pub fn send_command(&self, command: GameCommand) {
        trace!(kind = command.kind(), "Command queued");
        // The bridge owns a receiver, so the channel cannot be disconnected
        let _ = self.sender.send(command);
    }

    /// Record the mouse position in world coordinates.
    pub fn update_mouse_position(&self, world_pos: Vec2) {
        *self.mouse.write().unwrap_or_else(PoisonError::into_inner) = world_pos;
    }

    pub fn mouse_position(&self) -> Vec2 {
        *self.mouse.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of commands waiting for the next capture.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Drain every queued command and read the mouse position.
    pub fn capture_snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            commands: self.receiver.try_iter().collect(),
            mouse_world: self.mouse_position(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_snapshot_drains_in_order() {
        let bridge = GameBridge::new();
        bridge.send_command(GameCommand::Navigate { target: Vec2::X });
        bridge.send_command(GameCommand::ToggleDebug);
        bridge.update_mouse_position(Vec2::new(3.0, 4.0));
        assert_eq!(bridge.pending(), 2);

        let snapshot = bridge.capture_snapshot();
        assert_eq!(
            snapshot.commands,
            vec![GameCommand::Navigate { target: Vec2::X }, GameCommand::ToggleDebug]
        );
        assert_eq!(snapshot.mouse_world, Vec2::new(3.0, 4.0));
        assert!(bridge.capture_snapshot().commands.is_empty());
    }

    #[test]
    fn test_commands_from_other_threads() {
        let bridge = GameBridge::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let bridge = bridge.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        bridge.send_command(GameCommand::SetRally {
                            position: Vec2::splat(i as f32),
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bridge.capture_snapshot().commands.len(), 100);
    }
}
