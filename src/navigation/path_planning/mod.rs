//! Curve fitting for trajectory synthesis
//!
//! The trajectory generator only needs `y = f(x)` through a handful of anchor
//! points in the vehicle frame. Fitting is hidden behind [`CurveFitter`] so the
//! interpolation strategy can be swapped without touching the resampling loop.

use crate::common::types::Point2D;
use crate::error::{PlannerError, Result};
use std::fmt::Debug;

pub mod cubic_spline;

pub use self::cubic_spline::{NaturalCubicSpline, NaturalSplineFitter};

/// A fitted curve, local y as a function of local x
pub trait Curve: Debug + Send + Sync {
    /// Evaluate the curve at `x`
    fn evaluate(&self, x: f64) -> f64;
}

/// Trait for curve fitting strategies
pub trait CurveFitter: Debug + Send + Sync {
    /// Fit a curve through `points`, which must be strictly increasing in x
    fn fit(&self, points: &[Point2D]) -> Result<Box<dyn Curve>>;

    /// Get the name of this fitter
    fn name(&self) -> &str;
}

/// Fail with `DegenerateAnchors` unless x is strictly increasing
pub fn ensure_strictly_increasing(points: &[Point2D]) -> Result<()> {
    for (i, pair) in points.windows(2).enumerate() {
        let (previous_x, x) = (pair[0].0, pair[1].0);
        // Written so that NaN also fails
        if !(x > previous_x) {
            return Err(PlannerError::DegenerateAnchors {
                index: i + 1,
                previous_x,
                x,
            });
        }
    }
    Ok(())
}

/// Straight segments between anchors, extended linearly past both ends
#[derive(Debug, Default)]
pub struct PiecewiseLinearFitter;

#[derive(Debug)]
struct PiecewiseLinear {
    points: Vec<Point2D>,
}

impl Curve for PiecewiseLinear {
    fn evaluate(&self, x: f64) -> f64 {
        let n = self.points.len();
        let i = self
            .points
            .partition_point(|p| p.0 <= x)
            .clamp(1, n - 1);
        let (x0, y0) = self.points[i - 1];
        let (x1, y1) = self.points[i];
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

impl CurveFitter for PiecewiseLinearFitter {
    fn fit(&self, points: &[Point2D]) -> Result<Box<dyn Curve>> {
        if points.len() < 2 {
            return Err(PlannerError::CurveFit(format!(
                "need at least 2 points, got {}",
                points.len()
            )));
        }
        ensure_strictly_increasing(points)?;
        Ok(Box::new(PiecewiseLinear {
            points: points.to_vec(),
        }))
    }

    fn name(&self) -> &str {
        "PiecewiseLinearFitter"
    }
}
