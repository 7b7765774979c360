//! Perception module: interpreting the sensor fusion snapshot
pub mod traffic;

pub use self::traffic::{LaneAssignment, TrackedVehicle, TrafficFlags, TrafficObserver};
