//! Navigation module: road geometry and curve fitting
pub mod path_planning;
pub mod road_map;

pub use self::path_planning::{Curve, CurveFitter, NaturalSplineFitter};
pub use self::road_map::{RoadMap, Waypoint};
