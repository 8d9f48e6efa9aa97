//! Game settings: per-type unit stats and animation clip tables.
//!
//! Settings deserialize from JSON with string keys (`"Infantry"`,
//! `"Idle:South"`) and are resolved into typed lookup tables once at load.
//! Keys that do not resolve are logged and skipped. Lookups that miss at
//! runtime log and fall back to a safe default so a tick never aborts.

use std::collections::HashMap;
use std::path::Path;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::components::{AnimationKind, Direction, EntityType};
use crate::error::{Result, SimError};

/// Base stats of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityStats {
    pub max_hp: f32,
    pub move_speed: f32,
    pub build_time: f32,
    /// Collider radius.
    pub size: f32,
    pub attack_damage: f32,
    pub attack_range: f32,
    /// Seconds between attacks.
    pub attack_speed: f32,
    pub vision_range: f32,
}

impl Default for EntityStats {
    /// Deliberately weak stand-in used when a type has no configuration.
    fn default() -> Self {
        Self {
            max_hp: 1.0,
            move_speed: 0.0,
            build_time: 0.0,
            size: 10.0,
            attack_damage: 0.0,
            attack_range: 0.0,
            attack_speed: 0.0,
            vision_range: 0.0,
        }
    }
}

/// Frame range and timing of one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub start_frame: u32,
    pub end_frame: u32,
    pub frame_duration: f32,
    #[serde(default)]
    pub looping: bool,
}

/// Clip lookup key: what is happening and which way the unit faces.
pub type AnimationKey = (AnimationKind, Direction);

/// Every clip of one entity type.
#[derive(Debug, Clone, Default)]
pub struct UnitAnimations {
    pub total_frames: u32,
    clips: HashMap<AnimationKey, ClipInfo>,
}

impl UnitAnimations {
    pub fn insert(&mut self, kind: AnimationKind, direction: Direction, clip: ClipInfo) {
        self.clips.insert((kind, direction), clip);
    }

    /// Clip for `kind` facing `direction`, falling back to the undirected clip.
    pub fn clip(&self, kind: AnimationKind, direction: Direction) -> Option<ClipInfo> {
        self.clips
            .get(&(kind, direction))
            .or_else(|| self.clips.get(&(kind, Direction::None)))
            .copied()
    }
}

/// On-disk shape of the animation table of one type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawUnitAnimations {
    #[serde(default)]
    total_frames: u32,
    #[serde(default)]
    clips: HashMap<String, ClipInfo>,
}

/// On-disk shape of the whole settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawSettings {
    #[serde(default)]
    entities: HashMap<String, EntityStats>,
    #[serde(default)]
    animations: HashMap<String, RawUnitAnimations>,
}

fn parse_kind(s: &str) -> Option<AnimationKind> {
    match s.to_ascii_lowercase().as_str() {
        "idle" => Some(AnimationKind::Idle),
        "running" => Some(AnimationKind::Running),
        "attacking" => Some(AnimationKind::Attacking),
        "dying" => Some(AnimationKind::Dying),
        "paused" => Some(AnimationKind::Paused),
        _ => None,
    }
}

fn parse_direction(s: &str) -> Option<Direction> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Some(Direction::None),
        "north" => Some(Direction::North),
        "northeast" => Some(Direction::NorthEast),
        "east" => Some(Direction::East),
        "southeast" => Some(Direction::SouthEast),
        "south" => Some(Direction::South),
        "southwest" => Some(Direction::SouthWest),
        "west" => Some(Direction::West),
        "northwest" => Some(Direction::NorthWest),
        _ => None,
    }
}

/// Parse `"Kind"` or `"Kind:Direction"`.
fn parse_animation_key(key: &str) -> Option<AnimationKey> {
    match key.split_once(':') {
        Some((kind, direction)) => Some((parse_kind(kind.trim())?, parse_direction(direction.trim())?)),
        None => Some((parse_kind(key.trim())?, Direction::None)),
    }
}

/// Resolved settings shared by builders, AI and animation.
#[derive(Resource, Debug, Clone)]
pub struct GameSettings {
    entities: HashMap<EntityType, EntityStats>,
    animations: HashMap<EntityType, UnitAnimations>,
}

impl GameSettings {
    /// Settings with no types configured; every lookup falls back.
    pub fn empty() -> Self {
        Self {
            entities: HashMap::new(),
            animations: HashMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawSettings = serde_json::from_str(json).map_err(SimError::ConfigParse)?;
        Ok(Self::resolve(raw))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&json)?;
        info!(path = %path.display(), "Game settings loaded");
        Ok(settings)
    }

    fn resolve(raw: RawSettings) -> Self {
        let mut settings = Self::empty();

        for (key, stats) in raw.entities {
            match key.parse::<EntityType>() {
                Ok(kind) => {
                    settings.entities.insert(kind, stats);
                }
                Err(_) => warn!(key = %key, "Unknown unit type in settings"),
            }
        }

        for (key, raw_anims) in raw.animations {
            let Ok(kind) = key.parse::<EntityType>() else {
                warn!(key = %key, "Unknown unit animation type in settings");
                continue;
            };
            let mut anims = UnitAnimations {
                total_frames: raw_anims.total_frames,
                ..Default::default()
            };
            for (clip_key, clip) in raw_anims.clips {
                match parse_animation_key(&clip_key) {
                    Some((anim_kind, direction)) => anims.insert(anim_kind, direction, clip),
                    None => warn!(unit = %key, clip = %clip_key, "Unknown animation clip key"),
                }
            }
            settings.animations.insert(kind, anims);
        }

        settings
    }

    pub fn set_stats(&mut self, kind: EntityType, stats: EntityStats) {
        self.entities.insert(kind, stats);
    }

    pub fn set_animations(&mut self, kind: EntityType, animations: UnitAnimations) {
        self.animations.insert(kind, animations);
    }

    /// Stats of `kind`, or a minimal default (logged) when unconfigured.
    pub fn stats(&self, kind: EntityType) -> EntityStats {
        match self.entities.get(&kind) {
            Some(stats) => *stats,
            None => {
                error!(kind = kind.as_str(), "Unknown unit type, using default stats");
                EntityStats::default()
            }
        }
    }

    /// Clip table of `kind`, or `None` (logged) when unconfigured.
    pub fn animations(&self, kind: EntityType) -> Option<&UnitAnimations> {
        let animations = self.animations.get(&kind);
        if animations.is_none() {
            warn!(kind = kind.as_str(), "Unknown unit animation key");
        }
        animations
    }
}

impl Default for GameSettings {
    /// Built-in balance for every entity type.
    fn default() -> Self {
        let mut settings = Self::empty();

        settings.set_stats(
            EntityType::Infantry,
            EntityStats {
                max_hp: 100.0,
                move_speed: 150.0,
                build_time: 10.0,
                size: 20.0,
                attack_damage: 10.0,
                attack_range: 60.0,
                attack_speed: 1.0,
                vision_range: 400.0,
            },
        );
        settings.set_stats(
            EntityType::Barracks,
            EntityStats {
                max_hp: 1000.0,
                size: 150.0,
                ..EntityStats::default()
            },
        );

        let clip = |start_frame, end_frame, frame_duration, looping| ClipInfo {
            start_frame,
            end_frame,
            frame_duration,
            looping,
        };

        let mut infantry = UnitAnimations {
            total_frames: 32,
            ..Default::default()
        };
        infantry.insert(AnimationKind::Idle, Direction::South, clip(0, 8, 0.15, true));
        infantry.insert(AnimationKind::Idle, Direction::None, clip(0, 8, 0.15, true));
        infantry.insert(AnimationKind::Running, Direction::None, clip(8, 16, 0.1, true));
        infantry.insert(AnimationKind::Attacking, Direction::None, clip(16, 22, 0.08, false));
        infantry.insert(AnimationKind::Dying, Direction::None, clip(22, 30, 0.1, false));
        settings.set_animations(EntityType::Infantry, infantry);

        let mut barracks = UnitAnimations {
            total_frames: 12,
            ..Default::default()
        };
        barracks.insert(AnimationKind::Running, Direction::None, clip(0, 12, 0.1, true));
        barracks.insert(AnimationKind::Paused, Direction::None, clip(0, 1, 1.0, true));
        barracks.insert(AnimationKind::Dying, Direction::None, clip(0, 12, 0.05, false));
        settings.set_animations(EntityType::Barracks, barracks);

        settings
    }
}

/// Renderer overlay toggles flipped by debug commands.
#[derive(Resource, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DebugSettings {
    pub show_flow_field: bool,
    pub show_colliders: bool,
}
