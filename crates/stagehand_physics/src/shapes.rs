//! # Shape Overlap Tests
//!
//! Narrow-phase tests between two colliders. Every test returns a
//! [`Manifold`] whose normal points from the first shape towards the second,
//! or `None` when the shapes do not overlap. Touching is not overlapping.

use stagehand_core::{Aabb, Circle, Collider, Manifold};

/// Normal used when two centers coincide and no direction can be derived.
const FALLBACK_NORMAL: [f32; 2] = [1.0, 0.0];

/// Tests two colliders for overlap.
#[must_use]
pub fn collide(a: &Collider, b: &Collider) -> Option<Manifold> {
    match (a, b) {
        (Collider::Aabb(a), Collider::Aabb(b)) => aabb_aabb(a, b),
        (Collider::Circle(a), Collider::Circle(b)) => circle_circle(a, b),
        (Collider::Aabb(a), Collider::Circle(b)) => aabb_circle(a, b),
        (Collider::Circle(a), Collider::Aabb(b)) => aabb_circle(b, a).map(Manifold::flipped),
    }
}

/// Box against box. Separates along the axis of least penetration.
#[must_use]
pub fn aabb_aabb(a: &Aabb, b: &Aabb) -> Option<Manifold> {
    if !a.intersects(b) {
        return None;
    }

    let overlap = a.overlap(b);
    let ca = a.center();
    let cb = b.center();
    let axis = usize::from(overlap[1] < overlap[0]);

    let mut normal = [0.0; 2];
    normal[axis] = if cb[axis] >= ca[axis] { 1.0 } else { -1.0 };

    // Center of the intersection rectangle
    let point = [
        (a.min[0].max(b.min[0]) + a.max[0].min(b.max[0])) * 0.5,
        (a.min[1].max(b.min[1]) + a.max[1].min(b.max[1])) * 0.5,
    ];

    Some(Manifold {
        normal,
        depth: overlap[axis],
        point,
    })
}

/// Circle against circle.
#[must_use]
pub fn circle_circle(a: &Circle, b: &Circle) -> Option<Manifold> {
    let d = [b.center[0] - a.center[0], b.center[1] - a.center[1]];
    let radii = a.radius + b.radius;
    let dist_sq = d[0] * d[0] + d[1] * d[1];
    if dist_sq >= radii * radii {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON {
        [d[0] / dist, d[1] / dist]
    } else {
        FALLBACK_NORMAL
    };

    Some(Manifold {
        normal,
        depth: radii - dist,
        point: [
            a.center[0] + normal[0] * a.radius,
            a.center[1] + normal[1] * a.radius,
        ],
    })
}

/// Box against circle.
#[must_use]
pub fn aabb_circle(a: &Aabb, b: &Circle) -> Option<Manifold> {
    let closest = [
        b.center[0].clamp(a.min[0], a.max[0]),
        b.center[1].clamp(a.min[1], a.max[1]),
    ];
    let d = [b.center[0] - closest[0], b.center[1] - closest[1]];
    let dist_sq = d[0] * d[0] + d[1] * d[1];

    if dist_sq > f32::EPSILON {
        if dist_sq >= b.radius * b.radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        return Some(Manifold {
            normal: [d[0] / dist, d[1] / dist],
            depth: b.radius - dist,
            point: closest,
        });
    }

    // Center inside the box: push out through the nearest face
    let faces = [
        (b.center[0] - a.min[0], [-1.0, 0.0]),
        (a.max[0] - b.center[0], [1.0, 0.0]),
        (b.center[1] - a.min[1], [0.0, -1.0]),
        (a.max[1] - b.center[1], [0.0, 1.0]),
    ];
    let (distance, normal) = faces
        .into_iter()
        .fold((f32::INFINITY, FALLBACK_NORMAL), |best, face| {
            if face.0 < best.0 {
                face
            } else {
                best
            }
        });

    Some(Manifold {
        normal,
        depth: distance + b.radius,
        point: b.center,
    })
}
