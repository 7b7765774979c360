//! Configuration loading for the highway planner

use crate::error::{PlannerError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub road: RoadConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
}

/// Simulator bridge settings
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// WebSocket port the simulator connects to (default: 4567)
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Waypoint table settings
#[derive(Clone, Debug, Deserialize)]
pub struct MapConfig {
    /// Path to the whitespace separated waypoint table
    #[serde(default = "default_map_path")]
    pub path: String,

    /// Track length at which s wraps back to 0
    #[serde(default = "default_max_s")]
    pub max_s: f64,
}

/// Road geometry
#[derive(Clone, Debug, Deserialize)]
pub struct RoadConfig {
    /// Width of a single lane (default: 4.0)
    #[serde(default = "default_lane_width")]
    pub lane_width: f64,
}

/// Lane and speed decision parameters
#[derive(Clone, Debug, Deserialize)]
pub struct BehaviorConfig {
    /// Speed change per cycle in mph (default: 0.224)
    #[serde(default = "default_accel_step")]
    pub accel_step: f64,

    /// Speed cap in mph (default: 49.5)
    #[serde(default = "default_speed_cap")]
    pub speed_cap: f64,

    /// Gap ahead in our lane that counts as blocked
    #[serde(default = "default_ahead_gap")]
    pub ahead_gap: f64,

    /// Neighbour lane window behind the ego car
    #[serde(default = "default_side_gap_behind")]
    pub side_gap_behind: f64,

    /// Neighbour lane window ahead of the ego car
    #[serde(default = "default_side_gap_ahead")]
    pub side_gap_ahead: f64,

    /// Lane the session starts in (0 = left, 1 = center, 2 = right)
    #[serde(default = "default_initial_lane")]
    pub initial_lane: usize,
}

/// Trajectory synthesis parameters
#[derive(Clone, Debug, Deserialize)]
pub struct TrajectoryConfig {
    /// Points in every emitted trajectory (default: 50)
    #[serde(default = "default_horizon_points")]
    pub horizon_points: usize,

    /// Simulator tick in seconds (default: 0.02)
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f64,

    /// Spacing in s between forward anchors (default: 30.0)
    #[serde(default = "default_anchor_spacing")]
    pub anchor_spacing: f64,

    /// Number of forward anchors (default: 3)
    #[serde(default = "default_anchor_count")]
    pub anchor_count: usize,

    /// Local x of the chord used to approximate arc length (default: 30.0)
    #[serde(default = "default_lookahead_x")]
    pub lookahead_x: f64,

    /// mph per m/s (default: 2.237)
    #[serde(default = "default_mph_per_mps")]
    pub mph_per_mps: f64,

    /// Distance behind the car of the synthesized tail anchor (default: 1.0)
    #[serde(default = "default_tail_anchor_offset")]
    pub tail_anchor_offset: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            path: default_map_path(),
            max_s: default_max_s(),
        }
    }
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            lane_width: default_lane_width(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            accel_step: default_accel_step(),
            speed_cap: default_speed_cap(),
            ahead_gap: default_ahead_gap(),
            side_gap_behind: default_side_gap_behind(),
            side_gap_ahead: default_side_gap_ahead(),
            initial_lane: default_initial_lane(),
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            horizon_points: default_horizon_points(),
            tick_seconds: default_tick_seconds(),
            anchor_spacing: default_anchor_spacing(),
            anchor_count: default_anchor_count(),
            lookahead_x: default_lookahead_x(),
            mph_per_mps: default_mph_per_mps(),
            tail_anchor_offset: default_tail_anchor_offset(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4567
}
fn default_map_path() -> String {
    "data/highway_map.csv".to_string()
}
fn default_max_s() -> f64 {
    6945.554
}
fn default_lane_width() -> f64 {
    4.0
}

// Behavior defaults
fn default_accel_step() -> f64 {
    0.224
} // ~5 m/s^2 at 50 cycles per second
fn default_speed_cap() -> f64 {
    49.5
} // just under the 50 mph limit
fn default_ahead_gap() -> f64 {
    30.0
}
fn default_side_gap_behind() -> f64 {
    30.0
}
fn default_side_gap_ahead() -> f64 {
    20.0
}
fn default_initial_lane() -> usize {
    1
}

// Trajectory defaults
fn default_horizon_points() -> usize {
    50
}
fn default_tick_seconds() -> f64 {
    0.02
}
fn default_anchor_spacing() -> f64 {
    30.0
}
fn default_anchor_count() -> usize {
    3
}
fn default_lookahead_x() -> f64 {
    30.0
}
fn default_mph_per_mps() -> f64 {
    2.237
}
fn default_tail_anchor_offset() -> f64 {
    1.0
}

impl PlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PlannerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the planner cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.map.max_s > 0.0) {
            return Err(PlannerError::Config("map.max_s must be positive".into()));
        }
        if !(self.road.lane_width > 0.0) {
            return Err(PlannerError::Config("road.lane_width must be positive".into()));
        }
        if self.behavior.initial_lane > 2 {
            return Err(PlannerError::Config(format!(
                "behavior.initial_lane must be 0, 1 or 2, got {}",
                self.behavior.initial_lane
            )));
        }
        if !(self.behavior.accel_step > 0.0) || !(self.behavior.speed_cap > 0.0) {
            return Err(PlannerError::Config(
                "behavior.accel_step and behavior.speed_cap must be positive".into(),
            ));
        }
        if self.trajectory.horizon_points == 0 {
            return Err(PlannerError::Config(
                "trajectory.horizon_points must be at least 1".into(),
            ));
        }
        if self.trajectory.anchor_count == 0 || !(self.trajectory.anchor_spacing > 0.0) {
            return Err(PlannerError::Config(
                "trajectory needs at least one forward anchor with positive spacing".into(),
            ));
        }
        if !(self.trajectory.tick_seconds > 0.0)
            || !(self.trajectory.lookahead_x > 0.0)
            || !(self.trajectory.mph_per_mps > 0.0)
            || !(self.trajectory.tail_anchor_offset > 0.0)
        {
            return Err(PlannerError::Config(
                "trajectory timing and distance parameters must be positive".into(),
            ));
        }
        Ok(())
    }
}
