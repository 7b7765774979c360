//! Road map of reference waypoints
//!
//! The map is a closed loop of centerline samples. Each sample carries its
//! arc length `s` and the unit normal pointing towards increasing `d` (to the
//! right of the direction of travel). Positions between samples are linearly
//! interpolated, so the map behaves like a polyline with a seam between the
//! last and the first waypoint where `s` wraps at `max_s`.

use crate::common::types::Point2D;
use crate::error::{PlannerError, Result};
use nalgebra::Vector2;
use serde::Deserialize;
use std::f64::consts::PI;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// A sampled point on the road centerline
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub s: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Waypoint {
    fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    fn normal(&self) -> Vector2<f64> {
        Vector2::new(self.dx, self.dy)
    }
}

/// Immutable, cyclic waypoint table
#[derive(Debug, Clone)]
pub struct RoadMap {
    waypoints: Vec<Waypoint>,
    max_s: f64,
}

/// The segment containing a given `s`, with arc lengths unwrapped so that
/// `s_start <= s <= s_end` holds even across the seam
struct Segment<'a> {
    start: &'a Waypoint,
    end: &'a Waypoint,
    s_start: f64,
    s_end: f64,
}

impl RoadMap {
    /// Build a map from waypoints ordered by increasing `s`
    pub fn new(waypoints: Vec<Waypoint>, max_s: f64) -> Result<Self> {
        if !(max_s > 0.0) || !max_s.is_finite() {
            return Err(PlannerError::Config(format!(
                "max_s must be a positive finite length, got {}",
                max_s
            )));
        }
        if waypoints.is_empty() {
            return Err(PlannerError::Config("road map has no waypoints".into()));
        }

        for (i, wp) in waypoints.iter().enumerate() {
            let finite = [wp.x, wp.y, wp.s, wp.dx, wp.dy].iter().all(|v| v.is_finite());
            if !finite {
                return Err(PlannerError::MapFormat {
                    line: i + 1,
                    reason: "non-finite value".into(),
                });
            }
            if wp.s < 0.0 || wp.s >= max_s {
                return Err(PlannerError::MapFormat {
                    line: i + 1,
                    reason: format!("s = {} outside [0, {})", wp.s, max_s),
                });
            }
            if i > 0 && wp.s <= waypoints[i - 1].s {
                return Err(PlannerError::MapFormat {
                    line: i + 1,
                    reason: format!(
                        "s must be strictly increasing ({} after {})",
                        wp.s,
                        waypoints[i - 1].s
                    ),
                });
            }
        }

        Ok(RoadMap { waypoints, max_s })
    }

    /// Parse a whitespace separated `x y s dx dy` table
    ///
    /// Columns may be separated by any run of spaces or tabs.
    pub fn from_reader<R: Read>(reader: R, max_s: f64) -> Result<Self> {
        // One line out per line in, so csv positions still match the source
        let table: String = std::io::read_to_string(reader)?
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" ") + "\n")
            .collect();

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .from_reader(table.as_bytes());

        let mut waypoints = Vec::new();
        for row in csv_reader.deserialize::<Waypoint>() {
            waypoints.push(row?);
        }

        Self::new(waypoints, max_s)
    }

    /// Load the waypoint table from disk
    pub fn load(path: &Path, max_s: f64) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PlannerError::Config(format!("Failed to open road map {:?}: {}", path, e))
        })?;
        let map = Self::from_reader(file, max_s)?;
        info!(
            "Loaded {} waypoints from {:?} (max_s = {})",
            map.waypoints.len(),
            path,
            max_s
        );
        Ok(map)
    }

    /// All waypoints in order of increasing `s`
    pub fn waypoint_sequence(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn max_s(&self) -> f64 {
        self.max_s
    }

    /// Wrap an arc length into `[0, max_s)`
    pub fn wrap_s(&self, s: f64) -> f64 {
        let wrapped = s.rem_euclid(self.max_s);
        // rem_euclid can round up to max_s for tiny negative inputs
        if wrapped >= self.max_s {
            0.0
        } else {
            wrapped
        }
    }

    fn segment_at(&self, s: f64) -> Segment<'_> {
        let n = self.waypoints.len();
        let first = &self.waypoints[0];
        let last = &self.waypoints[n - 1];
        let i = self.waypoints.partition_point(|wp| wp.s <= s);

        if i == 0 {
            Segment {
                start: last,
                end: first,
                s_start: last.s - self.max_s,
                s_end: first.s,
            }
        } else if i == n {
            Segment {
                start: last,
                end: first,
                s_start: last.s,
                s_end: first.s + self.max_s,
            }
        } else {
            Segment {
                start: &self.waypoints[i - 1],
                end: &self.waypoints[i],
                s_start: self.waypoints[i - 1].s,
                s_end: self.waypoints[i].s,
            }
        }
    }

    /// Convert a Frenet coordinate to world coordinates
    pub fn to_cartesian(&self, s: f64, d: f64) -> Point2D {
        let s = self.wrap_s(s);
        let seg = self.segment_at(s);

        let span = seg.s_end - seg.s_start;
        let t = if span > 0.0 { (s - seg.s_start) / span } else { 0.0 };

        let start = seg.start.position();
        let center = start + (seg.end.position() - start) * t;

        // The segment is offset along the normal of the waypoint it starts at
        let normal = seg
            .start
            .normal()
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector2::zeros);

        let point = center + normal * d;
        (point.x, point.y)
    }

    /// Index of the waypoint nearest to `(x, y)`
    pub fn closest_waypoint(&self, x: f64, y: f64) -> usize {
        let target = Vector2::new(x, y);
        self.waypoints
            .iter()
            .enumerate()
            .map(|(i, wp)| (i, (wp.position() - target).norm_squared()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Index of the first waypoint ahead of a vehicle at `(x, y)` heading `yaw`
    pub fn next_waypoint(&self, x: f64, y: f64, yaw: f64) -> usize {
        let closest = self.closest_waypoint(x, y);
        let wp = &self.waypoints[closest];

        let heading = (wp.y - y).atan2(wp.x - x);
        let angle = (yaw - heading).rem_euclid(2.0 * PI);
        let angle = angle.min(2.0 * PI - angle);

        if angle > PI / 2.0 {
            (closest + 1) % self.waypoints.len()
        } else {
            closest
        }
    }

    /// Convert world coordinates to a Frenet coordinate
    ///
    /// Projects onto the segment that ends at the next waypoint. `d` is
    /// positive on the side the lane normals point to.
    pub fn to_frenet(&self, x: f64, y: f64, yaw: f64) -> (f64, f64) {
        let n = self.waypoints.len();
        if n == 1 {
            let wp = &self.waypoints[0];
            let offset = Vector2::new(x, y) - wp.position();
            return (wp.s, offset.dot(&wp.normal()));
        }

        let next = self.next_waypoint(x, y, yaw);
        let prev = if next == 0 { n - 1 } else { next - 1 };
        let a = &self.waypoints[prev];
        let b = &self.waypoints[next];

        let direction = b.position() - a.position();
        let offset = Vector2::new(x, y) - a.position();
        let length_sq = direction.norm_squared();
        if length_sq == 0.0 {
            return (a.s, offset.dot(&a.normal()));
        }

        let t = offset.dot(&direction) / length_sq;
        let foot = direction * t;

        // Right hand perpendicular, flipped to agree with the map's normals
        let mut perp = Vector2::new(direction.y, -direction.x) / length_sq.sqrt();
        if perp.dot(&a.normal()) < 0.0 {
            perp = -perp;
        }
        let d = (offset - foot).dot(&perp);

        let s_end = if next == 0 { b.s + self.max_s } else { b.s };
        let s = a.s + t * (s_end - a.s);
        (self.wrap_s(s), d)
    }
}
