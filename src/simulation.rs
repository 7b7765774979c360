//! Offline driving loop
//!
//! Stands in for the simulator when there is none: it consumes a fixed number
//! of points from every emitted trajectory, moves the car onto the last
//! consumed point and reports the rest back as the pending path. Traffic
//! moves along `s` at constant speed.

use crate::common::types::{Point2D, VehicleState};
use crate::common::units::distance;
use crate::error::{PlannerError, Result};
use crate::navigation::{RoadMap, Waypoint};
use crate::perception::TrackedVehicle;
use crate::session::CycleInput;
use std::f64::consts::PI;

/// Closed circular road travelled counter-clockwise, lanes on the outside
pub fn ring_road(radius: f64, waypoint_count: usize) -> Result<RoadMap> {
    if !(radius.is_finite() && radius > 0.0) || waypoint_count < 3 {
        return Err(PlannerError::Config(format!(
            "ring road needs a positive radius and at least 3 waypoints, got {} and {}",
            radius, waypoint_count
        )));
    }
    let step = 2.0 * PI / waypoint_count as f64;
    let chord = 2.0 * radius * (step / 2.0).sin();
    let waypoints = (0..waypoint_count)
        .map(|i| {
            let theta = i as f64 * step;
            Waypoint {
                x: radius * theta.cos(),
                y: radius * theta.sin(),
                s: i as f64 * chord,
                dx: theta.cos(),
                dy: theta.sin(),
            }
        })
        .collect();
    RoadMap::new(waypoints, waypoint_count as f64 * chord)
}

/// Straight road along +x with lanes on the -y side
pub fn straight_road(length: f64, spacing: f64) -> Result<RoadMap> {
    if !(length.is_finite() && length > 0.0 && spacing.is_finite() && spacing > 0.0) {
        return Err(PlannerError::Config(format!(
            "straight road needs positive length and spacing, got {} and {}",
            length, spacing
        )));
    }
    let count = (length / spacing).ceil() as usize;
    let waypoints = (0..count)
        .map(|i| Waypoint {
            x: i as f64 * spacing,
            y: 0.0,
            s: i as f64 * spacing,
            dx: 0.0,
            dy: -1.0,
        })
        .collect();
    RoadMap::new(waypoints, count as f64 * spacing)
}

/// Simulated ego vehicle and traffic
#[derive(Debug, Clone)]
pub struct OfflineDriver {
    pub ego: VehicleState,
    pub pending: Vec<Point2D>,
    pub traffic: Vec<TrackedVehicle>,
    consumed_per_cycle: usize,
    tick_seconds: f64,
    mph_per_mps: f64,
}

impl OfflineDriver {
    /// Place the car at `(s, d)` facing along the road, standing still
    pub fn new(map: &RoadMap, s: f64, d: f64, consumed_per_cycle: usize) -> Self {
        let (x, y) = map.to_cartesian(s, d);
        let (ahead_x, ahead_y) = map.to_cartesian(s + 1.0, d);
        OfflineDriver {
            ego: VehicleState {
                x,
                y,
                yaw: (ahead_y - y).atan2(ahead_x - x),
                speed: 0.0,
                s,
                d,
            },
            pending: Vec::new(),
            traffic: Vec::new(),
            consumed_per_cycle: consumed_per_cycle.max(1),
            tick_seconds: 0.02,
            mph_per_mps: 2.237,
        }
    }

    pub fn with_traffic(mut self, traffic: Vec<TrackedVehicle>) -> Self {
        self.traffic = traffic;
        self
    }

    /// What the simulator would report right now
    pub fn snapshot(&self, map: &RoadMap) -> CycleInput {
        let (end_path_s, end_path_d) = match self.pending.len() {
            0 => (0.0, 0.0),
            1 => {
                let p = self.pending[0];
                map.to_frenet(p.0, p.1, self.ego.yaw)
            }
            n => {
                let (a, b) = (self.pending[n - 2], self.pending[n - 1]);
                map.to_frenet(b.0, b.1, (b.1 - a.1).atan2(b.0 - a.0))
            }
        };

        CycleInput {
            ego: self.ego,
            pending: self.pending.clone(),
            end_path_s,
            end_path_d,
            vehicles: self.traffic.clone(),
        }
    }

    /// Drive along the front of `points` and keep the rest as pending
    pub fn advance(&mut self, map: &RoadMap, points: &[Point2D]) {
        let consumed = self.consumed_per_cycle.min(points.len());
        if consumed == 0 {
            return;
        }

        let mut previous = (self.ego.x, self.ego.y);
        let mut yaw = self.ego.yaw;
        let mut last_step = 0.0;
        for &p in &points[..consumed] {
            last_step = distance(previous, p);
            if last_step > 1e-9 {
                yaw = (p.1 - previous.1).atan2(p.0 - previous.0);
            }
            previous = p;
        }

        let (s, d) = map.to_frenet(previous.0, previous.1, yaw);
        self.ego = VehicleState {
            x: previous.0,
            y: previous.1,
            yaw,
            speed: last_step / self.tick_seconds * self.mph_per_mps,
            s,
            d,
        };
        self.pending = points[consumed..].to_vec();

        let elapsed = consumed as f64 * self.tick_seconds;
        for vehicle in &mut self.traffic {
            vehicle.s = map.wrap_s(vehicle.predicted_s(elapsed));
        }
    }
}
