//! Heading helpers on the horizontal plane.
//!
//! Yaw is measured in radians around `+Y`; a yaw of zero faces `+Z` and a
//! positive yaw turns toward `+X`.

use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec3};

const DEGENERATE_LENGTH_SQUARED: f32 = 1.0e-12;

/// Unit forward vector for the provided yaw.
#[must_use]
pub fn forward(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Right-hand vector of `direction`, rotated a quarter turn clockwise on the XZ plane.
#[must_use]
pub fn right_of(direction: Vec3) -> Vec3 {
    Vec3::new(direction.z, 0.0, -direction.x)
}

/// Rotates a local offset into world space for an agent facing `yaw`.
#[must_use]
pub fn rotate_offset(offset: Vec3, yaw: f32) -> Vec3 {
    Quat::from_rotation_y(yaw) * offset
}

/// Yaw that faces along `direction`, or `None` when it has no horizontal extent.
#[must_use]
pub fn yaw_of(direction: Vec3) -> Option<f32> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= DEGENERATE_LENGTH_SQUARED {
        return None;
    }
    Some(flat.x.atan2(flat.z))
}

/// Interpolates between two headings along the shortest arc.
#[must_use]
pub fn lerp_yaw(from: f32, to: f32, t: f32) -> f32 {
    from + wrap_angle(to - from) * t.clamp(0.0, 1.0)
}

/// Wraps an angle into `[-PI, PI)`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
