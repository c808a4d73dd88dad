use super::curve::ParametricCurve2d;
use super::{check_unit, Point2d};
use crate::error::Result;
use crate::util::Interval;
use cgmath::prelude::*;

/// The parameter step used to measure the arclength of a curve.
const ARCLENGTH_STEP: f64 = 0.01;

/// A cubic bezier curve
#[derive(Copy, Clone, Debug)]
pub struct CubicBezier2d {
    points: [Point2d; 4],
    length: f64,
}

impl CubicBezier2d {
    pub fn new(points: &[Point2d; 4]) -> Self {
        let mut curve = Self {
            points: *points,
            length: 0.0,
        };
        curve.recompute_length();
        curve
    }

    pub fn line(start: Point2d, end: Point2d) -> Self {
        let s = start.to_vec();
        let e = end.to_vec();
        let ps = [s, s.lerp(e, 1. / 3.), s.lerp(e, 2. / 3.), e];
        Self::new(&ps.map(Point2d::from_vec))
    }

    /// The four control points.
    pub fn points(&self) -> &[Point2d; 4] {
        &self.points
    }

    /// Replaces the control points, recomputing the arclength.
    pub fn set_points(&mut self, points: &[Point2d; 4]) {
        self.points = *points;
        self.recompute_length();
    }

    /// The approximate arclength of the curve.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Evaluates the curve, rejecting parameters outside [0, 1].
    pub fn point_at(&self, t: f64) -> Result<Point2d> {
        Ok(self.sample(check_unit("t", t)?))
    }

    /// Sums the chord lengths over a fixed parameter step.
    fn recompute_length(&mut self) {
        let steps = (1.0 / ARCLENGTH_STEP).round() as usize;
        let points = (0..=steps)
            .map(|i| self.sample(i as f64 / steps as f64))
            .collect::<Vec<_>>();
        self.length = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    }
}

impl ParametricCurve2d for CubicBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        let t1 = 1.0 - t;
        Point2d::from_vec(
            t1 * t1 * t1 * self.points[0].to_vec()
                + 3.0 * t1 * t1 * t * self.points[1].to_vec()
                + 3.0 * t1 * t * t * self.points[2].to_vec()
                + t * t * t * self.points[3].to_vec(),
        )
    }

    fn bounds(&self) -> Interval<f64> {
        Interval { min: 0.0, max: 1.0 }
    }
}
