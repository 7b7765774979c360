//! Highway planner core
//!
//! Behavior and trajectory planning for a car on a three lane highway loop.
//! Each telemetry cycle runs, leaf to root:
//!
//! - [`perception::TrafficObserver`] folds sensor fusion into proximity flags,
//! - [`behaviors::BehaviorPlanner`] picks the lane and the speed trend,
//! - [`control::TrajectoryGenerator`] extends the unconsumed trajectory along
//!   a spline anchored on the [`navigation::RoadMap`].
//!
//! [`session::PlannerSession`] owns the state carried between cycles.

pub mod behaviors;
pub mod bridge;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod perception;
pub mod session;
pub mod simulation;

pub use crate::config::PlannerConfig;
pub use crate::error::{PlannerError, Result};
pub use crate::navigation::RoadMap;
pub use crate::session::{CycleInput, CycleOutput, PlannerSession, PlannerState};
