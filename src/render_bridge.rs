//! Flat-buffer encoding of the render snapshot for FFI renderers.
//!
//! # Stable FFI Contract
//!
//! The flat buffer is a `Vec<f32>` with a fixed stride per item, so a
//! renderer on the other side of an FFI boundary can walk it without any
//! parsing or allocation.
//!
//! # Buffer Layout (Version 1.0)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ HEADER (3 elements)                                             │
//! │ [0] item_count (as f32)                                         │
//! │ [1] hover_kind  (see HOVER_* constants)                         │
//! │ [2] debug_flags (see DEBUG_* bits)                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ For each item i (offset = HEADER_SIZE + i * ITEM_STRIDE):       │
//! │   [+0]  index         - Entity index (u32 as f32)               │
//! │   [+1]  x             - X position (world units)                │
//! │   [+2]  y             - Y position (world units)                │
//! │   [+3]  type_id       - See TYPE_* constants                    │
//! │   [+4]  team          - Team id (u32 as f32)                    │
//! │   [+5]  width         - Render width                            │
//! │   [+6]  height        - Render height                           │
//! │   [+7]  collider_x    - Collider center X                       │
//! │   [+8]  collider_y    - Collider center Y                       │
//! │   [+9]  health        - Health fraction (0.0-1.0)               │
//! │   [+10] frame         - Sprite-sheet frame                      │
//! │   [+11] flags         - Bitmask of FLAG_* values                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Items keep the snapshot order (back to front). Entity indices above
//! 2^24 lose precision as `f32`; renderers only use them as sprite keys.

use crate::components::EntityType;
use crate::input::HoverKind;
use crate::world::{RenderItem, RenderSnapshot};

// ============================================================================
// CONSTANTS - STABLE FFI CONTRACT
// ============================================================================

/// Number of f32 values per item in the flat buffer.
///
/// **This is part of the stable FFI contract. Do not change without versioning.**
pub const ITEM_STRIDE: usize = 12;

/// Number of f32 values in the buffer header.
pub const HEADER_SIZE: usize = 3;

pub const TYPE_NONE: f32 = -1.0;
pub const TYPE_INFANTRY: f32 = 0.0;
pub const TYPE_BARRACKS: f32 = 1.0;

pub const HOVER_NONE: f32 = 0.0;
pub const HOVER_FRIEND: f32 = 1.0;
pub const HOVER_OPPONENT: f32 = 2.0;

pub const FLAG_SELECTED: u32 = 1;
pub const FLAG_HOVERED: u32 = 1 << 1;
pub const FLAG_DYING: u32 = 1 << 2;
pub const FLAG_BUILDING: u32 = 1 << 3;

pub const DEBUG_FLOW_FIELD: u32 = 1;
pub const DEBUG_COLLIDERS: u32 = 1 << 1;

pub const FIELD_INDEX: usize = 0;
pub const FIELD_X: usize = 1;
pub const FIELD_Y: usize = 2;
pub const FIELD_TYPE: usize = 3;
pub const FIELD_TEAM: usize = 4;
pub const FIELD_WIDTH: usize = 5;
pub const FIELD_HEIGHT: usize = 6;
pub const FIELD_COLLIDER_X: usize = 7;
pub const FIELD_COLLIDER_Y: usize = 8;
pub const FIELD_HEALTH: usize = 9;
pub const FIELD_FRAME: usize = 10;
pub const FIELD_FLAGS: usize = 11;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

#[inline]
pub fn type_to_id(kind: Option<EntityType>) -> f32 {
    match kind {
        Some(EntityType::Infantry) => TYPE_INFANTRY,
        Some(EntityType::Barracks) => TYPE_BARRACKS,
        None => TYPE_NONE,
    }
}

#[inline]
pub fn hover_to_id(kind: HoverKind) -> f32 {
    match kind {
        HoverKind::None => HOVER_NONE,
        HoverKind::Friend => HOVER_FRIEND,
        HoverKind::Opponent => HOVER_OPPONENT,
    }
}

fn item_flags(item: &RenderItem) -> u32 {
    let mut flags = 0;
    if item.selected {
        flags |= FLAG_SELECTED;
    }
    if item.hovered {
        flags |= FLAG_HOVERED;
    }
    if item.dying {
        flags |= FLAG_DYING;
    }
    if item.is_building {
        flags |= FLAG_BUILDING;
    }
    flags
}

// ============================================================================
// MAIN SERIALIZATION FUNCTION
// ============================================================================

/// Encode a snapshot as a flat buffer. See the module docs for the layout.
///
/// Deterministic: the same snapshot always produces the same buffer.
pub fn snapshot_to_flatbuffer(snapshot: &RenderSnapshot) -> Vec<f32> {
    let item_count = snapshot.items.len();
    let mut buffer = Vec::with_capacity(calculate_buffer_size(item_count));

    let mut debug_flags = 0;
    if snapshot.debug.show_flow_field {
        debug_flags |= DEBUG_FLOW_FIELD;
    }
    if snapshot.debug.show_colliders {
        debug_flags |= DEBUG_COLLIDERS;
    }

    buffer.push(item_count as f32);
    buffer.push(hover_to_id(snapshot.hover_kind));
    buffer.push(debug_flags as f32);

    for item in &snapshot.items {
        let collider_center = item
            .collider
            .map_or(item.position, |c| c.center(item.position));
        buffer.extend_from_slice(&[
            item.index as f32,
            item.position.x,
            item.position.y,
            type_to_id(item.kind),
            item.team as f32,
            item.render_size.x,
            item.render_size.y,
            collider_center.x,
            collider_center.y,
            item.health,
            item.frame as f32,
            item_flags(item) as f32,
        ]);
    }

    debug_assert_eq!(buffer.len(), calculate_buffer_size(item_count), "Buffer size mismatch");
    buffer
}

#[inline]
pub fn calculate_buffer_size(item_count: usize) -> usize {
    HEADER_SIZE + item_count * ITEM_STRIDE
}

/// Item count from the header. `None` if the buffer has no header.
#[inline]
pub fn parse_item_count(buffer: &[f32]) -> Option<usize> {
    if buffer.len() < HEADER_SIZE {
        return None;
    }
    Some(buffer[0] as usize)
}

#[inline]
pub const fn item_offset(item_index: usize) -> usize {
    HEADER_SIZE + item_index * ITEM_STRIDE
}
