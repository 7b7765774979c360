//! Traffic classification from sensor fusion
//!
//! Every tracked vehicle is assigned to a lane from its `d` coordinate, its
//! `s` is advanced to the time the pending trajectory runs out, and the
//! result is folded into three proximity flags relative to the ego car.

use crate::common::lanes::Lane;
use crate::config::{BehaviorConfig, RoadConfig};

/// A vehicle reported by sensor fusion for the current cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedVehicle {
    pub id: i64,
    pub vx: f64,
    pub vy: f64,
    pub s: f64,
    pub d: f64,
}

impl TrackedVehicle {
    /// Speed magnitude in m/s
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    /// Position along the road after `elapsed` seconds at constant speed
    pub fn predicted_s(&self, elapsed: f64) -> f64 {
        self.s + self.speed() * elapsed
    }
}

/// Lane a tracked vehicle was assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneAssignment {
    Occupied(Lane),
    /// Off the carriageway or exactly on a lane line
    Invalid,
}

impl LaneAssignment {
    /// Classify a lateral offset using open intervals per lane
    pub fn from_d(d: f64, lane_width: f64) -> Self {
        for lane in Lane::ALL {
            let low = lane.index() as f64 * lane_width;
            let high = low + lane_width;
            if d > low && d < high {
                return LaneAssignment::Occupied(lane);
            }
        }
        LaneAssignment::Invalid
    }
}

/// Proximity flags for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficFlags {
    pub car_ahead: bool,
    pub car_left: bool,
    pub car_right: bool,
}

/// Classifies surrounding traffic relative to the ego vehicle
#[derive(Debug, Clone)]
pub struct TrafficObserver {
    lane_width: f64,
    ahead_gap: f64,
    side_gap_behind: f64,
    side_gap_ahead: f64,
    max_s: Option<f64>,
}

impl TrafficObserver {
    /// Create an observer with the default windows
    pub fn new() -> Self {
        Self::from_config(&RoadConfig::default(), &BehaviorConfig::default())
    }

    pub fn from_config(road: &RoadConfig, behavior: &BehaviorConfig) -> Self {
        TrafficObserver {
            lane_width: road.lane_width,
            ahead_gap: behavior.ahead_gap,
            side_gap_behind: behavior.side_gap_behind,
            side_gap_ahead: behavior.side_gap_ahead,
            max_s: None,
        }
    }

    /// Measure gaps across the `s` seam of a closed track
    pub fn with_track_length(mut self, max_s: f64) -> Self {
        self.max_s = Some(max_s);
        self
    }

    /// Signed distance from `from` to `to` along the road
    fn gap(&self, from: f64, to: f64) -> f64 {
        let raw = to - from;
        match self.max_s {
            Some(max_s) => {
                let wrapped = raw.rem_euclid(max_s);
                if wrapped > max_s / 2.0 {
                    wrapped - max_s
                } else {
                    wrapped
                }
            }
            None => raw,
        }
    }

    /// Fold the sensor fusion snapshot into proximity flags
    ///
    /// `elapsed` is how long the still-pending trajectory lasts; other
    /// vehicles are projected forward by that much so they are compared with
    /// the ego car where it will be when the new points start.
    pub fn observe(
        &self,
        ego_s: f64,
        current_lane: Lane,
        vehicles: &[TrackedVehicle],
        elapsed: f64,
    ) -> TrafficFlags {
        let mut flags = TrafficFlags::default();

        for vehicle in vehicles {
            let lane = match LaneAssignment::from_d(vehicle.d, self.lane_width) {
                LaneAssignment::Occupied(lane) => lane,
                LaneAssignment::Invalid => continue,
            };

            let gap = self.gap(ego_s, vehicle.predicted_s(elapsed));
            let beside = gap > -self.side_gap_behind && gap < self.side_gap_ahead;

            if lane == current_lane {
                if gap > 0.0 && gap < self.ahead_gap {
                    flags.car_ahead = true;
                }
            } else if Some(lane) == current_lane.left() {
                flags.car_left |= beside;
            } else if Some(lane) == current_lane.right() {
                flags.car_right |= beside;
            }
        }

        flags
    }
}

impl Default for TrafficObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(s: f64, d: f64, vx: f64) -> TrackedVehicle {
        TrackedVehicle {
            id: 7,
            vx,
            vy: 0.0,
            s,
            d,
        }
    }

    #[test]
    fn lane_assignment_uses_open_intervals() {
        assert_eq!(LaneAssignment::from_d(2.0, 4.0), LaneAssignment::Occupied(Lane::Left));
        assert_eq!(LaneAssignment::from_d(6.0, 4.0), LaneAssignment::Occupied(Lane::Center));
        assert_eq!(LaneAssignment::from_d(11.9, 4.0), LaneAssignment::Occupied(Lane::Right));
        assert_eq!(LaneAssignment::from_d(0.0, 4.0), LaneAssignment::Invalid);
        assert_eq!(LaneAssignment::from_d(4.0, 4.0), LaneAssignment::Invalid);
        assert_eq!(LaneAssignment::from_d(12.0, 4.0), LaneAssignment::Invalid);
        assert_eq!(LaneAssignment::from_d(-3.0, 4.0), LaneAssignment::Invalid);
    }

    #[test]
    fn car_ahead_in_same_lane() {
        let observer = TrafficObserver::new();
        let flags = observer.observe(100.0, Lane::Center, &[vehicle(115.0, 6.0, 0.0)], 0.0);
        assert_eq!(
            flags,
            TrafficFlags {
                car_ahead: true,
                car_left: false,
                car_right: false
            }
        );
    }

    #[test]
    fn same_s_in_right_lane_is_car_right() {
        let observer = TrafficObserver::new();
        let flags = observer.observe(100.0, Lane::Center, &[vehicle(115.0, 10.0, 0.0)], 0.0);
        assert!(flags.car_right);
        assert!(!flags.car_ahead);
        assert!(!flags.car_left);
    }

    #[test]
    fn side_window_is_thirty_behind_twenty_ahead() {
        let observer = TrafficObserver::new();
        let left = |s: f64| observer.observe(100.0, Lane::Center, &[vehicle(s, 2.0, 0.0)], 0.0);
        assert!(left(75.0).car_left);
        assert!(left(119.0).car_left);
        assert!(!left(65.0).car_left);
        assert!(!left(125.0).car_left);
    }

    #[test]
    fn prediction_moves_vehicle_into_window() {
        let observer = TrafficObserver::new();
        // Behind us now, 10 ahead after 2.5 s at 20 m/s
        let target = vehicle(60.0, 6.0, 20.0);
        assert!(!observer.observe(100.0, Lane::Center, &[target], 0.0).car_ahead);
        let flags = observer.observe(100.0, Lane::Center, &[target], 2.5);
        assert!(flags.car_ahead);
    }

    #[test]
    fn no_left_neighbour_from_leftmost_lane() {
        let observer = TrafficObserver::new();
        // A car two lanes over is neither left nor right
        let flags = observer.observe(100.0, Lane::Left, &[vehicle(100.0, 10.0, 0.0)], 0.0);
        assert_eq!(flags, TrafficFlags::default());
    }

    #[test]
    fn invalid_lanes_are_ignored() {
        let observer = TrafficObserver::new();
        let flags = observer.observe(
            100.0,
            Lane::Center,
            &[vehicle(110.0, 4.0, 0.0), vehicle(110.0, 14.0, 0.0)],
            0.0,
        );
        assert_eq!(flags, TrafficFlags::default());
    }

    #[test]
    fn gaps_wrap_across_the_seam() {
        let observer = TrafficObserver::new().with_track_length(1000.0);
        let flags = observer.observe(990.0, Lane::Center, &[vehicle(5.0, 6.0, 0.0)], 0.0);
        assert!(flags.car_ahead);
        let flags = observer.observe(5.0, Lane::Center, &[vehicle(990.0, 6.0, 0.0)], 0.0);
        assert!(!flags.car_ahead);
    }
}
