//! Common utilities and types for the highway planner

/// Common types and utilities used across the codebase
pub mod types {
    /// A 2D point in world or local coordinates
    pub type Point2D = (f64, f64);

    /// A 2D pose (x, y, yaw in radians)
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Pose2D {
        pub x: f64,
        pub y: f64,
        pub yaw: f64,
    }

    impl Pose2D {
        pub fn new(x: f64, y: f64, yaw: f64) -> Self {
            Pose2D { x, y, yaw }
        }

        pub fn position(&self) -> Point2D {
            (self.x, self.y)
        }
    }

    /// Ego vehicle state in both Cartesian and Frenet frames
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct VehicleState {
        pub x: f64,
        pub y: f64,
        /// Heading in radians
        pub yaw: f64,
        /// Speed in mph
        pub speed: f64,
        pub s: f64,
        pub d: f64,
    }

    impl VehicleState {
        pub fn pose(&self) -> Pose2D {
            Pose2D::new(self.x, self.y, self.yaw)
        }
    }
}

/// Driving lanes, numbered from the left
pub mod lanes {
    use std::fmt;

    /// One of the three lanes of a carriageway
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Lane {
        Left,
        Center,
        Right,
    }

    impl Lane {
        pub const ALL: [Lane; 3] = [Lane::Left, Lane::Center, Lane::Right];

        /// Lane for a zero based index, if there is one
        pub fn from_index(index: usize) -> Option<Lane> {
            Lane::ALL.get(index).copied()
        }

        pub fn index(self) -> usize {
            match self {
                Lane::Left => 0,
                Lane::Center => 1,
                Lane::Right => 2,
            }
        }

        /// Neighbour towards index 0
        pub fn left(self) -> Option<Lane> {
            self.index().checked_sub(1).and_then(Lane::from_index)
        }

        /// Neighbour towards index 2
        pub fn right(self) -> Option<Lane> {
            Lane::from_index(self.index() + 1)
        }

        /// Lateral offset of the lane center
        pub fn center_d(self, lane_width: f64) -> f64 {
            lane_width * (self.index() as f64 + 0.5)
        }
    }

    impl fmt::Display for Lane {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "lane {}", self.index())
        }
    }
}

/// Unit conversions
pub mod units {
    use std::f64::consts::PI;

    pub fn deg_to_rad(deg: f64) -> f64 {
        deg * PI / 180.0
    }

    pub fn rad_to_deg(rad: f64) -> f64 {
        rad * 180.0 / PI
    }

    /// Distance covered in one tick at `speed_mph`
    pub fn tick_distance(speed_mph: f64, tick_seconds: f64, mph_per_mps: f64) -> f64 {
        tick_seconds * speed_mph / mph_per_mps
    }

    pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
        ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
    }
}
