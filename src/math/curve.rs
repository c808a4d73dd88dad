use super::Point2d;
use crate::util::Interval;

/// A parametric curve in 2D space.
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Returns the minimum and maximum t-values that define the bounds of the curve.
    fn bounds(&self) -> Interval<f64>;
}

impl<T: ParametricCurve2d + ?Sized> ParametricCurve2d for &T {
    fn sample(&self, t: f64) -> Point2d {
        (**self).sample(t)
    }

    fn bounds(&self) -> Interval<f64> {
        (**self).bounds()
    }
}

/// Splits a curve into `n` pieces of equal parameter width and returns the `n + 1` break points.
pub fn sample_uniform(curve: &impl ParametricCurve2d, n: usize) -> Vec<Point2d> {
    let bounds = curve.bounds();
    (0..=n)
        .map(|i| curve.sample(bounds.lerp(i as f64 / n as f64)))
        .collect()
}
