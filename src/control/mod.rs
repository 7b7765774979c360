//! Control module: turning decisions into drivable points
pub mod trajectory;

pub use self::trajectory::{Trajectory, TrajectoryGenerator, TrajectoryRequest};
