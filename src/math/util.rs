use super::Vector2d;
use crate::error::{Result, SimError};
use cgmath::prelude::*;

/// Rotates a vector 90 degrees anti-clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The signed angle in radians that rotates `from` onto `to`,
/// positive when the rotation is anti-clockwise.
pub fn signed_angle(from: Vector2d, to: Vector2d) -> f64 {
    f64::atan2(from.perp_dot(to), from.dot(to))
}

/// A unit vector pointing at the given heading angle.
pub fn heading_vector(angle: f64) -> Vector2d {
    Vector2d::new(angle.cos(), angle.sin())
}

/// Rejects a parameter outside the unit interval.
pub(crate) fn check_unit(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SimError::ParameterOutOfRange { name, value })
    }
}
