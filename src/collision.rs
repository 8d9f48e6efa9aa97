//! Narrow-phase collision tests between body colliders.
//!
//! All functions are pure. Normals always point from B toward A, so pushing
//! A along the normal by `penetration` separates the pair.

use glam::Vec2;

use crate::components::{BodyCollider, BodyShape};

const MIN_DISTANCE: f32 = 0.0001;

/// Outcome of a pairwise test.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionResult {
    pub has_collision: bool,
    pub penetration: f32,
    pub normal: Vec2,
}

impl CollisionResult {
    const NONE: Self = Self {
        has_collision: false,
        penetration: 0.0,
        normal: Vec2::ZERO,
    };

    fn hit(normal: Vec2, penetration: f32) -> Self {
        Self {
            has_collision: true,
            penetration,
            normal,
        }
    }
}

/// Test collider A at `pos_a` against collider B at `pos_b`.
///
/// Box-box pairs are never tested (static obstacles do not move) and report
/// no collision.
pub fn calculate_collision(pos_a: Vec2, a: &BodyCollider, pos_b: Vec2, b: &BodyCollider) -> CollisionResult {
    let center_a = a.center(pos_a);
    let center_b = b.center(pos_b);

    match (a.shape, b.shape) {
        (BodyShape::Circle, BodyShape::Circle) => circle_circle(center_a, a.size.x, center_b, b.size.x),
        (BodyShape::Circle, BodyShape::Aabb) => circle_aabb(center_a, a.size.x, center_b, b.size),
        (BodyShape::Aabb, BodyShape::Circle) => {
            let mut result = circle_aabb(center_b, b.size.x, center_a, a.size);
            result.normal = -result.normal;
            result
        }
        (BodyShape::Aabb, BodyShape::Aabb) => CollisionResult::NONE,
    }
}

/// Circle A against circle B.
pub fn circle_circle(center_a: Vec2, radius_a: f32, center_b: Vec2, radius_b: f32) -> CollisionResult {
    let dist_sq = center_a.distance_squared(center_b);
    let min_dist = radius_a + radius_b;
    if dist_sq >= min_dist * min_dist {
        return CollisionResult::NONE;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > MIN_DISTANCE {
        (center_a - center_b) / dist
    } else {
        Vec2::X
    };
    CollisionResult::hit(normal, min_dist - dist)
}

/// Circle against an axis-aligned box given by center and half extents.
///
/// Uses the closest point on the box. When the circle center is inside the
/// box the circle is pushed out through the nearest face.
pub fn circle_aabb(circle: Vec2, radius: f32, box_center: Vec2, half: Vec2) -> CollisionResult {
    let difference = circle - box_center;
    let closest = box_center + difference.clamp(-half, half);
    let direction = circle - closest;
    let dist_sq = direction.length_squared();

    if dist_sq > MIN_DISTANCE {
        if dist_sq >= radius * radius {
            return CollisionResult::NONE;
        }
        let dist = dist_sq.sqrt();
        return CollisionResult::hit(direction / dist, radius - dist);
    }

    let dist_x = half.x - difference.x.abs();
    let dist_y = half.y - difference.y.abs();
    if dist_x < dist_y {
        let sign = if difference.x < 0.0 { -1.0 } else { 1.0 };
        CollisionResult::hit(Vec2::new(sign, 0.0), dist_x + radius)
    } else {
        let sign = if difference.y < 0.0 { -1.0 } else { 1.0 };
        CollisionResult::hit(Vec2::new(0.0, sign), dist_y + radius)
    }
}

/// Whether `point` lies inside a collider placed at `pos`.
pub fn point_in_collider(point: Vec2, pos: Vec2, collider: &BodyCollider) -> bool {
    let center = collider.center(pos);
    match collider.shape {
        BodyShape::Circle => point.distance_squared(center) <= collider.size.x * collider.size.x,
        BodyShape::Aabb => {
            let d = (point - center).abs();
            d.x <= collider.size.x && d.y <= collider.size.y
        }
    }
}

/// Whether a collider placed at `pos` overlaps the box `[min, max]`.
pub fn collider_overlaps_rect(pos: Vec2, collider: &BodyCollider, min: Vec2, max: Vec2) -> bool {
    let center = collider.center(pos);
    match collider.shape {
        BodyShape::Circle => {
            let closest = center.clamp(min, max);
            center.distance_squared(closest) < collider.size.x * collider.size.x
        }
        BodyShape::Aabb => {
            let other_min = center - collider.size;
            let other_max = center + collider.size;
            min.x <= other_max.x && max.x >= other_min.x && min.y <= other_max.y && max.y >= other_min.y
        }
    }
}
