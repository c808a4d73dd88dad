use super::curve::{sample_uniform, ParametricCurve2d};
use super::{check_unit, LineSegment2d, Point2d, Vector2d};
use crate::error::{Result, SimError};
use cgmath::prelude::*;

/// How far apart consecutive segments may be and still count as joined, in m.
const CONTIGUITY_TOLERANCE: f64 = 1e-6;

/// A tube of constant radius around a polyline.
///
/// Vehicles travel along the polyline, which is the midline of a lane, and are
/// considered to be within the lane while they are less than `radius` from it.
#[derive(Clone, Debug)]
pub struct Path {
    /// The contiguous segments making up the midline.
    segments: Vec<LineSegment2d>,
    /// The distance along the path at which each segment begins.
    offsets: Vec<f64>,
    /// The total length in m.
    length: f64,
    /// The half-width of the tube in m.
    radius: f64,
}

impl Path {
    /// Creates a path from a list of contiguous segments.
    pub fn new(segments: Vec<LineSegment2d>, radius: f64) -> Result<Self> {
        if segments.is_empty() {
            return Err(SimError::EmptyPath);
        }
        if !(radius > 0.0) {
            return Err(SimError::InvalidPathRadius(radius));
        }
        if let Some(idx) = (1..segments.len()).find(|&i| {
            segments[i].source.distance(segments[i - 1].target) > CONTIGUITY_TOLERANCE
        }) {
            return Err(SimError::DiscontiguousPath(idx));
        }

        let mut offsets = Vec::with_capacity(segments.len());
        let mut length = 0.0;
        for segment in &segments {
            offsets.push(length);
            length += segment.length();
        }

        Ok(Self {
            segments,
            offsets,
            length,
            radius,
        })
    }

    /// Creates a path consisting of a single straight segment.
    pub fn straight(start: Point2d, end: Point2d, radius: f64) -> Result<Self> {
        Self::new(vec![LineSegment2d::from_ends(start, end)], radius)
    }

    /// Approximates a curve by `num_segments` segments of equal parameter width.
    pub fn from_curve(
        curve: &impl ParametricCurve2d,
        num_segments: usize,
        radius: f64,
    ) -> Result<Self> {
        if num_segments == 0 {
            return Err(SimError::InvalidSegmentCount);
        }
        let points = sample_uniform(curve, num_segments);
        let segments = points
            .windows(2)
            .map(|w| LineSegment2d::from_ends(w[0], w[1]))
            .collect();
        Self::new(segments, radius)
    }

    /// The total length of the path in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The half-width of the path in m.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn segments(&self) -> &[LineSegment2d] {
        &self.segments
    }

    pub fn start(&self) -> Point2d {
        self.segments[0].source
    }

    pub fn end(&self) -> Point2d {
        self.segments[self.segments.len() - 1].target
    }

    /// The vertices of the midline polyline.
    pub fn points(&self) -> impl Iterator<Item = Point2d> + '_ {
        std::iter::once(self.start()).chain(self.segments.iter().map(|s| s.target))
    }

    /// Finds the segment closest to `point`. Ties go to the earliest segment.
    pub fn closest_segment(&self, point: Point2d) -> (usize, &LineSegment2d) {
        let mut best = (0, f64::INFINITY);
        for (idx, segment) in self.segments.iter().enumerate() {
            let dist = segment.distance_to(point);
            if dist < best.1 {
                best = (idx, dist);
            }
        }
        (best.0, &self.segments[best.0])
    }

    /// The point on the midline closest to `point`.
    pub fn normal_projection(&self, point: Point2d) -> Point2d {
        self.closest_segment(point).1.closest_point(point)
    }

    /// The unit direction of the midline nearest to `point`.
    pub fn tangent(&self, point: Point2d) -> Vector2d {
        self.closest_segment(point).1.direction()
    }

    /// The perpendicular distance from the midline to `point`, positive on the left.
    pub fn signed_distance(&self, point: Point2d) -> f64 {
        let (_, segment) = self.closest_segment(point);
        (point - segment.closest_point(point)).dot(segment.normal())
    }

    /// The distance along the path of the projection of `point`, in m.
    ///
    /// Points before the start of the path have a negative progress and points
    /// beyond its end have a progress greater than its length.
    pub fn progress(&self, point: Point2d) -> f64 {
        let (idx, segment) = self.closest_segment(point);
        let mut t = segment.inv_lerp(point);
        if idx > 0 {
            t = t.max(0.0);
        }
        if idx + 1 < self.segments.len() {
            t = t.min(1.0);
        }
        self.offsets[idx] + t * segment.length()
    }

    /// The progress of `point` as a fraction of the path's length.
    pub fn inv_lerp(&self, point: Point2d) -> f64 {
        self.progress(point) / self.length
    }

    /// The distance remaining from the projection of `point` to the end of the path.
    pub fn distance_to_end(&self, point: Point2d) -> f64 {
        self.length - self.progress(point)
    }

    /// The point a fraction `t` of the way along the path.
    pub fn position(&self, t: f64) -> Result<Point2d> {
        let t = check_unit("t", t)?;
        Ok(self.point_at_distance(t * self.length))
    }

    /// The point `dist` metres along the path, clamped to its ends.
    pub fn point_at_distance(&self, dist: f64) -> Point2d {
        if dist >= self.length {
            return self.end();
        }
        let (segment, t) = self.locate(dist);
        match t {
            t if t <= 0.0 => segment.source,
            t if t >= 1.0 => segment.target,
            t => segment.lerp(t),
        }
    }

    /// The direction of the path `dist` metres along it.
    pub fn tangent_at_distance(&self, dist: f64) -> Vector2d {
        self.locate(dist).0.direction()
    }

    /// Finds the segment containing the point `dist` metres along the path,
    /// and the parameter of that point within the segment.
    fn locate(&self, dist: f64) -> (&LineSegment2d, f64) {
        let idx = self
            .offsets
            .partition_point(|offset| *offset <= dist)
            .saturating_sub(1);
        let segment = &self.segments[idx];
        let len = segment.length();
        let t = if len > 0.0 {
            (dist - self.offsets[idx]) / len
        } else {
            1.0
        };
        (segment, t)
    }
}
