//! Formation slot generators for group move orders.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Distance between neighboring formation slots, in world units.
pub const FORMATION_SPACING: f32 = 70.0;
/// Slots per row for grid formations.
pub const FORMATION_COLUMNS: usize = 10;

/// Produces slot positions around a target point.
pub trait Formation {
    /// Position of the `index`-th slot.
    fn slot(&self, center: Vec2, index: usize) -> Vec2;

    /// The first `count` slots.
    fn slots(&self, center: Vec2, count: usize) -> Vec<Vec2> {
        (0..count).map(|i| self.slot(center, i)).collect()
    }
}

/// 0, +1, -1, +2, -2, ... for alternating around a center line.
#[inline]
fn alternating(index: usize) -> f32 {
    if index == 0 {
        return 0.0;
    }
    let magnitude = index.div_ceil(2) as f32;
    if index % 2 == 1 {
        magnitude
    } else {
        -magnitude
    }
}

/// Rows growing away from the click, columns alternating right/left of it.
#[derive(Debug, Clone, Copy)]
pub struct RectangleFormation {
    pub spacing: f32,
    pub columns: usize,
}

impl Default for RectangleFormation {
    fn default() -> Self {
        Self {
            spacing: FORMATION_SPACING,
            columns: FORMATION_COLUMNS,
        }
    }
}

impl Formation for RectangleFormation {
    fn slot(&self, center: Vec2, index: usize) -> Vec2 {
        let columns = self.columns.max(1);
        let row = index / columns;
        let col = index % columns;
        center + Vec2::new(alternating(col) * self.spacing, row as f32 * self.spacing)
    }
}

/// Like [`RectangleFormation`] but rows also alternate, keeping the block centered.
#[derive(Debug, Clone, Copy)]
pub struct CenterRectangleFormation {
    pub spacing: f32,
    pub columns: usize,
}

impl Default for CenterRectangleFormation {
    fn default() -> Self {
        Self {
            spacing: FORMATION_SPACING,
            columns: FORMATION_COLUMNS,
        }
    }
}

impl Formation for CenterRectangleFormation {
    fn slot(&self, center: Vec2, index: usize) -> Vec2 {
        let columns = self.columns.max(1);
        let row = index / columns;
        let col = index % columns;
        center + Vec2::new(alternating(col), alternating(row)) * self.spacing
    }
}

/// Sunflower spiral: even density without a grid look.
#[derive(Debug, Clone, Copy)]
pub struct SpiralFormation {
    pub spacing: f32,
}

impl Default for SpiralFormation {
    fn default() -> Self {
        Self {
            spacing: FORMATION_SPACING,
        }
    }
}

impl Formation for SpiralFormation {
    fn slot(&self, center: Vec2, index: usize) -> Vec2 {
        const GOLDEN_ANGLE_DEG: f32 = 137.508;
        if index == 0 {
            return center;
        }
        let radius = (index as f32).sqrt() * self.spacing;
        let theta = index as f32 * GOLDEN_ANGLE_DEG.to_radians();
        center + Vec2::from_angle(theta) * radius
    }
}

/// Which formation a group move uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormationKind {
    #[default]
    Rectangle,
    CenterRectangle,
    Spiral,
}

impl FormationKind {
    /// Generate `count` slots with the default spacing for this kind.
    pub fn slots(self, center: Vec2, count: usize) -> Vec<Vec2> {
        match self {
            FormationKind::Rectangle => RectangleFormation::default().slots(center, count),
            FormationKind::CenterRectangle => CenterRectangleFormation::default().slots(center, count),
            FormationKind::Spiral => SpiralFormation::default().slots(center, count),
        }
    }
}
