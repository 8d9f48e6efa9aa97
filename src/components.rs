//! ECS Components for the skirmish simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use std::str::FromStr;
use std::sync::{Arc, Weak};

use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::navigation::FlowField;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World-space location.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec2);

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }
}

/// Displacement per second, integrated by the movement system.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec2);

/// Base movement speed in world units per second.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MoveSpeed(pub f32);

/// Shape of a body collider. Fixed when the entity is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyShape {
    #[default]
    Circle,
    Aabb,
}

/// Physical extent used for avoidance and selection.
///
/// For circles `size.x` is the radius; for AABBs `size` holds the half extents.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyCollider {
    pub shape: BodyShape,
    pub size: Vec2,
    /// Offset of the collider center from the entity position.
    pub offset: Vec2,
    /// How strongly other movers are pushed out of this collider.
    pub avoidance_force: f32,
}

impl BodyCollider {
    pub fn circle(radius: f32, offset: Vec2, avoidance_force: f32) -> Self {
        Self {
            shape: BodyShape::Circle,
            size: Vec2::new(radius, 0.0),
            offset,
            avoidance_force,
        }
    }

    pub fn aabb(half_extents: Vec2, avoidance_force: f32) -> Self {
        Self {
            shape: BodyShape::Aabb,
            size: half_extents,
            offset: Vec2::ZERO,
            avoidance_force,
        }
    }

    /// Collider center for an entity at `position`.
    #[inline]
    pub fn center(&self, position: Vec2) -> Vec2 {
        position + self.offset
    }

    /// Radius of a circle collider, or the half-diagonal of a box.
    pub fn bounding_radius(&self) -> f32 {
        match self.shape {
            BodyShape::Circle => self.size.x,
            BodyShape::Aabb => self.size.length(),
        }
    }
}

/// Size of the sprite box, centered on the collider center.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RenderSize(pub Vec2);

// ============================================================================
// NAVIGATION COMPONENTS
// ============================================================================

/// An active move order.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Destination {
    pub target: Vec2,
    pub stop_distance_sq: f32,
    pub active: bool,
}

impl Destination {
    pub fn idle(stop_distance_sq: f32) -> Self {
        Self {
            target: Vec2::ZERO,
            stop_distance_sq,
            active: false,
        }
    }

    pub fn towards(target: Vec2, stop_distance_sq: f32) -> Self {
        Self {
            target,
            stop_distance_sq,
            active: true,
        }
    }
}

/// Non-owning handle to a cached flow field.
///
/// The field belongs to the [`FlowFieldManager`](crate::navigation::FlowFieldManager);
/// once the manager recycles it, [`FlowFieldRef::resolve`] returns `None`.
#[derive(Component, Debug, Clone, Default)]
pub struct FlowFieldRef {
    field: Weak<FlowField>,
    pub active: bool,
}

impl FlowFieldRef {
    pub fn new(field: Option<&Arc<FlowField>>) -> Self {
        match field {
            Some(field) => Self {
                field: Arc::downgrade(field),
                active: true,
            },
            None => Self::default(),
        }
    }

    /// Upgrade to the live field, if it is still cached.
    pub fn resolve(&self) -> Option<Arc<FlowField>> {
        if !self.active {
            return None;
        }
        self.field.upgrade()
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Every buildable entity type. Keys builders, config and pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    /// Melee foot soldier.
    Infantry,
    /// Building that trains infantry on a timer.
    Barracks,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Infantry, EntityType::Barracks];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Infantry => "Infantry",
            EntityType::Barracks => "Barracks",
        }
    }
}

impl FromStr for EntityType {
    type Err = SimError;

    /// Case-insensitive, matching how settings files spell type keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimError::UnknownEntityType(s.to_string()))
    }
}

/// Unit type of a mobile entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityClass(pub EntityType);

/// Type of a building. Buildings are skipped by drag selection.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingClass(pub EntityType);

/// Faction ownership. Fixed after spawn.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u32);

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Hit points of a unit or building.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Melee/ranged capability.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CombatStats {
    pub attack_damage: f32,
    pub attack_range: f32,
    /// Seconds between attacks.
    pub attack_interval: f32,
    /// Seconds until the next attack may land.
    pub cooldown: f32,
    pub vision_range: f32,
}

/// Entity currently being attacked, if any.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttackTarget(pub Option<Entity>);

// ============================================================================
// PRODUCTION COMPONENTS
// ============================================================================

/// Where freshly produced units walk to.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RallyPoint {
    pub target: Vec2,
    pub is_set: bool,
}

impl RallyPoint {
    pub fn at(target: Vec2) -> Self {
        Self {
            target,
            is_set: true,
        }
    }
}

/// Timer-driven unit production.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AutoProduction {
    pub interval: f32,
    pub progress: f32,
    pub product: EntityType,
    pub rally: RallyPoint,
}

// ============================================================================
// ANIMATION COMPONENTS
// ============================================================================

/// What an animation clip depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnimationKind {
    #[default]
    Idle,
    Running,
    Attacking,
    Dying,
    Paused,
}

/// Eight-way facing. `None` is used by clips that have no direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    None,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Facing for a screen-space vector (y grows downwards, so -y is north).
    pub fn from_vector(v: Vec2) -> Self {
        if v == Vec2::ZERO {
            return Direction::South;
        }
        let angle = (v.y.atan2(v.x).to_degrees() + 112.5).rem_euclid(360.0);
        match (angle / 45.0) as i32 % 8 {
            0 => Direction::North,
            1 => Direction::NorthEast,
            2 => Direction::East,
            3 => Direction::SouthEast,
            4 => Direction::South,
            5 => Direction::SouthWest,
            6 => Direction::West,
            _ => Direction::NorthWest,
        }
    }
}

/// Current facing of a unit.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Facing(pub Direction);

/// Sprite-sheet playback state. Written by the core, read by renderers.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnimationState {
    /// Whose clip table this animation reads from.
    pub clip_owner: EntityType,
    pub kind: AnimationKind,
    pub direction: Direction,
    pub start_frame: u32,
    pub end_frame: u32,
    /// Frames advanced since the clip started.
    pub offset: u32,
    pub frame_timer: f32,
    pub frame_duration: f32,
    pub looping: bool,
    pub active: bool,
}

impl AnimationState {
    /// A stopped animation with no clip loaded.
    pub fn empty(clip_owner: EntityType) -> Self {
        Self {
            clip_owner,
            kind: AnimationKind::Idle,
            direction: Direction::None,
            start_frame: 0,
            end_frame: 0,
            offset: 0,
            frame_timer: 0.0,
            frame_duration: 0.0,
            looping: false,
            active: false,
        }
    }

    /// Sprite-sheet frame to draw.
    pub fn current_frame(&self) -> u32 {
        self.start_frame + self.offset
    }
}

// ============================================================================
// TAGS
// ============================================================================

/// Pooled entity. Excluded from every active query.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Disabled;

/// Playing its death animation. Cannot be targeted.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct IsDying;

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct IsSelected;

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct IsHovered;

/// Can be picked by selection commands.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Selectable;

/// Terrain collider created by the map loader.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct StaticObstacle;

/// Production buildings that are currently allowed to produce.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ProductionEnabled;
