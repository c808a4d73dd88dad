//! Miscellaneous utility structs and functions.

use crate::math::Point2d;
use cgmath::num_traits::Float;
use std::fmt::Debug;

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

/// An axis-aligned rectangle, used to describe the footprint of topology entities.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct Rect {
    pub x: Interval<f64>,
    pub y: Interval<f64>,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl<T: std::ops::Sub<T, Output = T> + Copy> Interval<T> {
    /// Gets the magnitude of the interval.
    pub fn length(&self) -> T {
        self.max - self.min
    }
}

impl<T: Float> Interval<T> {
    /// Creates an interval with the given centre and radius.
    pub fn disc(centre: T, radius: T) -> Self {
        Self {
            min: centre - radius,
            max: centre + radius,
        }
    }

    pub fn lerp(&self, t: T) -> T {
        self.min + t * (self.max - self.min)
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

impl Rect {
    /// Creates a rectangle centred on `centre` with the given half extents.
    pub fn centred(centre: Point2d, half_x: f64, half_y: f64) -> Self {
        Self {
            x: Interval::disc(centre.x, half_x),
            y: Interval::disc(centre.y, half_y),
        }
    }

    /// Creates the smallest rectangle containing all of the given points.
    pub fn bounding(points: impl IntoIterator<Item = Point2d>) -> Option<Self> {
        points.into_iter().fold(None, |rect, p| {
            Some(match rect {
                None => Rect {
                    x: Interval::new(p.x, p.x),
                    y: Interval::new(p.y, p.y),
                },
                Some(Rect { x, y }) => Rect {
                    x: Interval::new(x.min.min(p.x), x.max.max(p.x)),
                    y: Interval::new(y.min.min(p.y), y.max.max(p.y)),
                },
            })
        })
    }

    /// Returns true if the point lies within the rectangle.
    pub fn contains(&self, point: Point2d) -> bool {
        self.x.contains(point.x) && self.y.contains(point.y)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounding_rect() {
        let rect = Rect::bounding([
            Point2d::new(1.0, 5.0),
            Point2d::new(-2.0, 3.0),
            Point2d::new(4.0, -1.0),
        ])
        .unwrap();
        assert_eq!(rect.x, Interval::new(-2.0, 4.0));
        assert_eq!(rect.y, Interval::new(-1.0, 5.0));
        assert!(rect.contains(Point2d::new(0.0, 0.0)));
        assert!(Rect::bounding(std::iter::empty()).is_none());
    }
}
