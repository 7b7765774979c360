//! Behaviors module: lane and speed decisions
//!
//! Precedence, highest first:
//!
//! 1. Blocked ahead: pass on the left if it is free, else on the right if it is
//!    free, else stay and brake.
//! 2. Road clear: drift back to the center lane when the side facing it is
//!    free, and speed up while below the cap.
//!
//! At most one lane change is proposed per cycle.

use crate::common::lanes::Lane;
use crate::config::BehaviorConfig;
use crate::perception::TrafficFlags;

/// Outcome of one decision cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorDecision {
    pub lane: Lane,
    /// Velocity change per generated point, in mph
    pub speed_delta: f64,
}

impl BehaviorDecision {
    pub fn changes_lane(&self, from: Lane) -> bool {
        self.lane != from
    }
}

/// Chooses target lane and speed trend from traffic flags
#[derive(Debug, Clone)]
pub struct BehaviorPlanner {
    accel_step: f64,
    speed_cap: f64,
}

impl BehaviorPlanner {
    /// Create a planner with the default step and cap
    pub fn new() -> Self {
        Self::from_config(&BehaviorConfig::default())
    }

    pub fn from_config(config: &BehaviorConfig) -> Self {
        BehaviorPlanner {
            accel_step: config.accel_step,
            speed_cap: config.speed_cap,
        }
    }

    pub fn accel_step(&self) -> f64 {
        self.accel_step
    }

    pub fn speed_cap(&self) -> f64 {
        self.speed_cap
    }

    /// Decide the lane and speed delta for this cycle
    pub fn decide(
        &self,
        flags: TrafficFlags,
        current_lane: Lane,
        reference_velocity: f64,
    ) -> BehaviorDecision {
        if flags.car_ahead {
            if let (false, Some(left)) = (flags.car_left, current_lane.left()) {
                return BehaviorDecision {
                    lane: left,
                    speed_delta: 0.0,
                };
            }
            if let (false, Some(right)) = (flags.car_right, current_lane.right()) {
                return BehaviorDecision {
                    lane: right,
                    speed_delta: 0.0,
                };
            }
            return BehaviorDecision {
                lane: current_lane,
                speed_delta: -self.accel_step,
            };
        }

        // Only the flag on the side facing the center lane is consulted
        let lane = match current_lane {
            Lane::Right if !flags.car_left => Lane::Center,
            Lane::Left if !flags.car_right => Lane::Center,
            other => other,
        };

        let speed_delta = if reference_velocity < self.speed_cap {
            self.accel_step
        } else {
            0.0
        };

        BehaviorDecision { lane, speed_delta }
    }
}

impl Default for BehaviorPlanner {
    fn default() -> Self {
        Self::new()
    }
}
