use super::{check_unit, rot90, ParametricCurve2d, Point2d, Vector2d};
use crate::error::Result;
use crate::util::Interval;
use cgmath::prelude::*;

/// A directed straight line between two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSegment2d {
    pub source: Point2d,
    pub target: Point2d,
}

impl LineSegment2d {
    /// Creates a line segment from its two end points.
    pub const fn from_ends(source: Point2d, target: Point2d) -> Self {
        Self { source, target }
    }

    /// The vector from the source to the target.
    pub fn vector(&self) -> Vector2d {
        self.target - self.source
    }

    pub fn length(&self) -> f64 {
        self.vector().magnitude()
    }

    /// A unit vector pointing from the source to the target.
    pub fn direction(&self) -> Vector2d {
        let v = self.vector();
        let mag = v.magnitude();
        if mag > 0.0 {
            v / mag
        } else {
            Vector2d::zero()
        }
    }

    pub fn midpoint(&self) -> Point2d {
        self.source.midpoint(self.target)
    }

    /// A unit vector perpendicular to the segment, pointing to its left.
    pub fn normal(&self) -> Vector2d {
        rot90(self.direction())
    }

    /// The point at parameter `t` along the segment, without bounds checks.
    pub fn lerp(&self, t: f64) -> Point2d {
        self.source + self.vector() * t
    }

    /// Extracts the part of the segment between two fractional offsets.
    pub fn sub_segment(&self, from: f64, to: f64) -> Result<Self> {
        let from = check_unit("from", from)?;
        let to = check_unit("to", to)?;
        let point = |t: f64| match t {
            t if t == 0.0 => self.source,
            t if t == 1.0 => self.target,
            t => self.lerp(t),
        };
        Ok(Self::from_ends(point(from), point(to)))
    }

    /// The parameter of the projection of `point` onto the line through the segment.
    /// Values outside [0, 1] lie beyond the segment's ends.
    pub fn inv_lerp(&self, point: Point2d) -> f64 {
        let v = self.vector();
        let len2 = v.magnitude2();
        if len2 > 0.0 {
            (point - self.source).dot(v) / len2
        } else {
            0.0
        }
    }

    /// Projects `point` onto the line through the segment.
    pub fn project(&self, point: Point2d) -> Point2d {
        self.lerp(self.inv_lerp(point))
    }

    /// The point on the segment closest to `point`.
    pub fn closest_point(&self, point: Point2d) -> Point2d {
        self.lerp(self.inv_lerp(point).clamp(0.0, 1.0))
    }

    /// The distance from `point` to the segment.
    pub fn distance_to(&self, point: Point2d) -> f64 {
        point.distance(self.closest_point(point))
    }
}

impl ParametricCurve2d for LineSegment2d {
    fn sample(&self, t: f64) -> Point2d {
        self.lerp(t)
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }
}
