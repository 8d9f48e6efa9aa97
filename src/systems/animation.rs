//! Sprite-sheet animation playback.

use bevy_ecs::prelude::*;
use tracing::warn;

use crate::components::{AnimationKind, AnimationState, Direction, Disabled, EntityType};
use crate::config::{ClipInfo, GameSettings};
use crate::systems::movement::DeltaTime;

impl AnimationState {
    /// Fresh playback of `clip` for `clip_owner`.
    pub fn from_clip(
        clip_owner: EntityType,
        kind: AnimationKind,
        direction: Direction,
        clip: ClipInfo,
    ) -> Self {
        Self {
            clip_owner,
            kind,
            direction,
            start_frame: clip.start_frame,
            end_frame: clip.end_frame,
            offset: 0,
            frame_timer: 0.0,
            frame_duration: clip.frame_duration,
            looping: clip.looping,
            active: true,
        }
    }

    /// Switch to the clip for `kind` facing `direction`.
    ///
    /// Re-requesting the clip that is already playing is a no-op so loops do
    /// not restart every tick. A finished one-shot clip restarts. Returns
    /// `false` when no clip is configured; the current state is kept.
    pub fn switch(&mut self, settings: &GameSettings, kind: AnimationKind, direction: Direction) -> bool {
        if self.active && self.kind == kind && self.direction == direction {
            return true;
        }
        let Some(clip) = settings
            .animations(self.clip_owner)
            .and_then(|anims| anims.clip(kind, direction))
        else {
            warn!(
                owner = self.clip_owner.as_str(),
                kind = ?kind,
                direction = ?direction,
                "Missing animation clip"
            );
            return false;
        };
        *self = Self::from_clip(self.clip_owner, kind, direction, clip);
        true
    }

    /// Frames in the current clip.
    pub fn frame_count(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Whether a one-shot clip has reached its last frame.
    pub fn is_finished(&self) -> bool {
        !self.looping && !self.active
    }

    /// Advance playback by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if !self.active || self.frame_duration <= 0.0 {
            return;
        }
        self.frame_timer += dt;
        let frames = self.frame_count();
        while self.frame_timer >= self.frame_duration {
            self.frame_timer -= self.frame_duration;
            if frames == 0 {
                continue;
            }
            if self.looping {
                self.offset = (self.offset + 1) % frames;
            } else if self.offset + 1 >= frames {
                // one-shot clips hold their last frame
                self.offset = frames - 1;
                self.active = false;
                self.frame_timer = 0.0;
                return;
            } else {
                self.offset += 1;
            }
        }
    }
}

/// Advance every active animation.
pub fn animation_system(dt: Res<DeltaTime>, mut query: Query<&mut AnimationState, Without<Disabled>>) {
    for mut anim in query.iter_mut() {
        if anim.active {
            anim.advance(dt.0);
        }
    }
}
