//! Natural cubic spline
//!
//! Second derivatives vanish at both end knots. Outside the knot range the
//! spline continues as a straight line with the end slope, which keeps
//! extrapolation a few meters past the last anchor well behaved.

use super::{ensure_strictly_increasing, Curve, CurveFitter};
use crate::common::types::Point2D;
use crate::error::{PlannerError, Result};
use nalgebra::{DMatrix, DVector};

/// Piecewise cubic `y = a + b*h + c*h^2 + d*h^3` with `h = x - x[i]`
#[derive(Debug, Clone)]
pub struct NaturalCubicSpline {
    x: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
    // slopes used for linear extrapolation
    slope_start: f64,
    slope_end: f64,
}

impl NaturalCubicSpline {
    /// Fit through `points`, which must be strictly increasing in x
    pub fn new(points: &[Point2D]) -> Result<Self> {
        let n = points.len();
        if n < 2 {
            return Err(PlannerError::CurveFit(format!(
                "need at least 2 points, got {}",
                n
            )));
        }
        ensure_strictly_increasing(points)?;

        let x: Vec<f64> = points.iter().map(|p| p.0).collect();
        let y: Vec<f64> = points.iter().map(|p| p.1).collect();
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

        // Tridiagonal system for the second derivatives, natural ends
        let mut system = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);
        system[(0, 0)] = 1.0;
        system[(n - 1, n - 1)] = 1.0;
        for i in 1..n - 1 {
            system[(i, i - 1)] = h[i - 1];
            system[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            system[(i, i + 1)] = h[i];
            rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }

        let m = system
            .lu()
            .solve(&rhs)
            .ok_or_else(|| PlannerError::CurveFit("spline system is singular".into()))?;

        let segments = n - 1;
        let mut b = Vec::with_capacity(segments);
        let mut c = Vec::with_capacity(segments);
        let mut d = Vec::with_capacity(segments);
        for i in 0..segments {
            b.push((y[i + 1] - y[i]) / h[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0);
            c.push(m[i] / 2.0);
            d.push((m[i + 1] - m[i]) / (6.0 * h[i]));
        }

        let last = segments - 1;
        let slope_start = b[0];
        let slope_end = b[last] + 2.0 * c[last] * h[last] + 3.0 * d[last] * h[last].powi(2);

        // `a` keeps the final knot value too, for extrapolation past the end
        Ok(NaturalCubicSpline {
            x,
            a: y,
            b,
            c,
            d,
            slope_start,
            slope_end,
        })
    }

    /// First derivative at `x`
    pub fn slope(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.slope_start;
        }
        if x >= self.x[n - 1] {
            return self.slope_end;
        }
        let i = self.search_index(x);
        let h = x - self.x[i];
        self.b[i] + 2.0 * self.c[i] * h + 3.0 * self.d[i] * h.powi(2)
    }

    fn search_index(&self, x: f64) -> usize {
        // segment i covers [x[i], x[i+1])
        let segments = self.x.len() - 1;
        self.x
            .partition_point(|&knot| knot <= x)
            .saturating_sub(1)
            .min(segments - 1)
    }
}

impl Curve for NaturalCubicSpline {
    fn evaluate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x < self.x[0] {
            return self.a[0] + self.slope_start * (x - self.x[0]);
        }
        if x > self.x[n - 1] {
            return self.a[n - 1] + self.slope_end * (x - self.x[n - 1]);
        }
        let i = self.search_index(x);
        let h = x - self.x[i];
        self.a[i] + self.b[i] * h + self.c[i] * h.powi(2) + self.d[i] * h.powi(3)
    }
}

/// Fits [`NaturalCubicSpline`]s
#[derive(Debug, Default)]
pub struct NaturalSplineFitter;

impl CurveFitter for NaturalSplineFitter {
    fn fit(&self, points: &[Point2D]) -> Result<Box<dyn Curve>> {
        Ok(Box::new(NaturalCubicSpline::new(points)?))
    }

    fn name(&self) -> &str {
        "NaturalSplineFitter"
    }
}
