//! Trajectory generation module
//!
//! Each cycle keeps whatever the simulator has not consumed yet and appends
//! new points until the horizon is full. New points follow a spline fitted in
//! the frame of the last committed pose, through two tail anchors and a few
//! anchors projected ahead along the chosen lane.
//!
//! Arc length along the spline is approximated by the chord to a fixed
//! lookahead point. That holds at highway curvature and speed; on tight bends
//! the emitted spacing runs slightly long.

use crate::common::lanes::Lane;
use crate::common::types::{Point2D, Pose2D, VehicleState};
use crate::common::units::{distance, tick_distance};
use crate::config::{BehaviorConfig, RoadConfig, TrajectoryConfig};
use crate::error::Result;
use crate::navigation::path_planning::{CurveFitter, NaturalSplineFitter};
use crate::navigation::RoadMap;
use nalgebra::{Isometry2, Point2, Vector2};
use tracing::trace;

/// Pending points closer than this give no usable heading
const MIN_ANCHOR_SEPARATION: f64 = 1e-6;

/// Everything one generation step needs
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryRequest<'a> {
    pub ego: &'a VehicleState,
    /// Points issued earlier and not yet driven
    pub pending: &'a [Point2D],
    /// `s` at the end of the pending points, or the car's `s` if none
    pub reference_s: f64,
    pub lane: Lane,
    /// Velocity at the end of the pending points, in mph
    pub reference_velocity: f64,
    /// Velocity change applied before each new point, in mph
    pub speed_delta: f64,
}

/// A full horizon of points
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub points: Vec<Point2D>,
    /// Velocity reached at the last point, in mph
    pub final_velocity: f64,
    /// How many leading points were carried over unchanged
    pub reused: usize,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Split into the simulator's parallel coordinate lists
    pub fn to_xy(&self) -> (Vec<f64>, Vec<f64>) {
        self.points.iter().copied().unzip()
    }
}

/// A trajectory generator for the ego vehicle
#[derive(Debug)]
pub struct TrajectoryGenerator {
    horizon_points: usize,
    tick_seconds: f64,
    anchor_spacing: f64,
    anchor_count: usize,
    lookahead_x: f64,
    mph_per_mps: f64,
    tail_anchor_offset: f64,
    lane_width: f64,
    accel_step: f64,
    speed_cap: f64,
    fitter: Box<dyn CurveFitter>,
}

impl TrajectoryGenerator {
    /// Create a generator with default parameters and a natural cubic spline
    pub fn new() -> Self {
        Self::from_config(
            &TrajectoryConfig::default(),
            &RoadConfig::default(),
            &BehaviorConfig::default(),
        )
    }

    pub fn from_config(
        trajectory: &TrajectoryConfig,
        road: &RoadConfig,
        behavior: &BehaviorConfig,
    ) -> Self {
        TrajectoryGenerator {
            horizon_points: trajectory.horizon_points,
            tick_seconds: trajectory.tick_seconds,
            anchor_spacing: trajectory.anchor_spacing,
            anchor_count: trajectory.anchor_count,
            lookahead_x: trajectory.lookahead_x,
            mph_per_mps: trajectory.mph_per_mps,
            tail_anchor_offset: trajectory.tail_anchor_offset,
            lane_width: road.lane_width,
            accel_step: behavior.accel_step,
            speed_cap: behavior.speed_cap,
            fitter: Box::new(NaturalSplineFitter),
        }
    }

    /// Swap the curve fitting strategy
    pub fn with_fitter<F: CurveFitter + 'static>(mut self, fitter: F) -> Self {
        self.fitter = Box::new(fitter);
        self
    }

    pub fn fitter_name(&self) -> &str {
        self.fitter.name()
    }

    pub fn horizon_points(&self) -> usize {
        self.horizon_points
    }

    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    /// Reference pose and the two tail anchors in world coordinates
    ///
    /// Unlike a plain "last two pending points" rule, coincident trailing
    /// points are skipped when picking the heading, and a tail that never
    /// moved falls back to the car's yaw.
    fn tail_anchors(&self, ego: &VehicleState, pending: &[Point2D]) -> (Pose2D, [Point2D; 2]) {
        let reference = match pending {
            [] | [_] => ego.pose(),
            [.., last] => {
                // The newest earlier point that gives a usable heading
                let before = pending[..pending.len() - 1]
                    .iter()
                    .rev()
                    .find(|&&p| distance(p, *last) > MIN_ANCHOR_SEPARATION);
                match before {
                    Some(&before) => {
                        let yaw = (last.1 - before.1).atan2(last.0 - before.0);
                        return (Pose2D::new(last.0, last.1, yaw), [before, *last]);
                    }
                    // Standing still: the pending points all coincide
                    None => Pose2D::new(last.0, last.1, ego.yaw),
                }
            }
        };

        // Pretend the car came from one step straight behind the reference
        let behind = (
            reference.x - self.tail_anchor_offset * reference.yaw.cos(),
            reference.y - self.tail_anchor_offset * reference.yaw.sin(),
        );
        (reference, [behind, reference.position()])
    }

    /// Generate the next horizon of points
    ///
    /// Fails with `DegenerateAnchors` when the anchors do not advance in the
    /// reference frame, e.g. when the lane anchors end up behind the
    /// reference pose.
    pub fn generate(&self, request: &TrajectoryRequest<'_>, map: &RoadMap) -> Result<Trajectory> {
        let (reference, tail) = self.tail_anchors(request.ego, request.pending);

        let lane_d = request.lane.center_d(self.lane_width);
        let mut anchors: Vec<Point2D> = Vec::with_capacity(2 + self.anchor_count);
        anchors.extend_from_slice(&tail);
        for k in 1..=self.anchor_count {
            let s = request.reference_s + k as f64 * self.anchor_spacing;
            anchors.push(map.to_cartesian(s, lane_d));
        }

        // Car at the origin facing +x
        let frame = Isometry2::new(Vector2::new(reference.x, reference.y), reference.yaw);
        let local: Vec<Point2D> = anchors
            .iter()
            .map(|&(x, y)| {
                let p = frame.inverse_transform_point(&Point2::new(x, y));
                (p.x, p.y)
            })
            .collect();

        let curve = self.fitter.fit(&local)?;

        let reused = request.pending.len().min(self.horizon_points);
        let mut points = Vec::with_capacity(self.horizon_points);
        points.extend_from_slice(&request.pending[..reused]);

        let target_x = self.lookahead_x;
        let target_y = curve.evaluate(target_x);
        let chord = (target_x * target_x + target_y * target_y).sqrt();

        let mut velocity = request.reference_velocity;
        let mut x_local = 0.0;
        for _ in reused..self.horizon_points {
            velocity = (velocity + request.speed_delta).clamp(0.0, self.speed_cap);
            let step = tick_distance(velocity, self.tick_seconds, self.mph_per_mps);
            x_local += step * target_x / chord;
            let y_local = curve.evaluate(x_local);

            let world = frame.transform_point(&Point2::new(x_local, y_local));
            points.push((world.x, world.y));
        }

        trace!(
            "Generated {} points ({} reused), velocity {:.3} -> {:.3}",
            points.len(),
            reused,
            request.reference_velocity,
            velocity
        );

        Ok(Trajectory {
            points,
            final_velocity: velocity,
            reused,
        })
    }

    /// Keep the pending points and brake to a stop after them
    ///
    /// Used when the spline cannot be fitted. The speed of the last pending
    /// step drops by `accel_step` per tick and the new points continue
    /// straight along the last heading. With nothing pending the car's own
    /// speed and yaw are used.
    pub fn stop_extension(&self, ego: &VehicleState, pending: &[Point2D]) -> Trajectory {
        let reused = pending.len().min(self.horizon_points);
        let kept = &pending[..reused];

        let origin = (ego.x, ego.y);
        let (mut position, mut velocity, yaw) = match kept {
            [] => (origin, ego.speed, ego.yaw),
            [.., last] => {
                let before = kept.len().checked_sub(2).map_or(origin, |i| kept[i]);
                let step = distance(before, *last);
                let yaw = if step > MIN_ANCHOR_SEPARATION {
                    (last.1 - before.1).atan2(last.0 - before.0)
                } else {
                    ego.yaw
                };
                (*last, step / self.tick_seconds * self.mph_per_mps, yaw)
            }
        };
        velocity = velocity.clamp(0.0, self.speed_cap);

        let mut points = Vec::with_capacity(self.horizon_points);
        points.extend_from_slice(kept);
        let (sin, cos) = yaw.sin_cos();
        for _ in reused..self.horizon_points {
            velocity = (velocity - self.accel_step).max(0.0);
            let step = tick_distance(velocity, self.tick_seconds, self.mph_per_mps);
            position = (position.0 + step * cos, position.1 + step * sin);
            points.push(position);
        }

        Trajectory {
            points,
            final_velocity: velocity,
            reused,
        }
    }
}

impl Default for TrajectoryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use crate::navigation::path_planning::PiecewiseLinearFitter;
    use crate::navigation::Waypoint;
    use approx::assert_abs_diff_eq;

    /// Straight road along +x, lanes to the -y side
    fn straight_map() -> RoadMap {
        let waypoints = (0..50)
            .map(|i| Waypoint {
                x: i as f64 * 30.0,
                y: 0.0,
                s: i as f64 * 30.0,
                dx: 0.0,
                dy: -1.0,
            })
            .collect();
        RoadMap::new(waypoints, 1500.0).unwrap()
    }

    fn ego_at(s: f64, d: f64, speed: f64) -> VehicleState {
        VehicleState {
            x: s,
            y: -d,
            yaw: 0.0,
            speed,
            s,
            d,
        }
    }

    fn speeds(points: &[Point2D]) -> Vec<f64> {
        // mph between consecutive points
        points
            .windows(2)
            .map(|w| {
                let dist = ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt();
                dist / 0.02 * 2.237
            })
            .collect()
    }

    #[test]
    fn fresh_start_fills_the_horizon() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 0.0);
        let generator = TrajectoryGenerator::new();
        let trajectory = generator
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &[],
                    reference_s: ego.s,
                    lane: Lane::Center,
                    reference_velocity: 0.0,
                    speed_delta: 0.224,
                },
                &map,
            )
            .unwrap();

        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory.reused, 0);
        assert_abs_diff_eq!(trajectory.final_velocity, 50.0 * 0.224, epsilon = 1e-9);

        // Every step moves forward
        let mut previous = (ego.x, ego.y);
        for &p in &trajectory.points {
            assert!(p.0 > previous.0);
            previous = p;
        }

        // Leaves along the car's heading
        let first = trajectory.points[0];
        let heading = (first.1 - ego.y).atan2(first.0 - ego.x);
        assert_abs_diff_eq!(heading, ego.yaw, epsilon = 1e-3);
    }

    #[test]
    fn pending_points_are_kept_verbatim() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 20.0);
        let pending: Vec<Point2D> = (1..=20).map(|i| (100.0 + i as f64 * 0.2, -6.0)).collect();
        let trajectory = TrajectoryGenerator::new()
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &pending,
                    reference_s: 104.0,
                    lane: Lane::Center,
                    reference_velocity: 22.37,
                    speed_delta: 0.0,
                },
                &map,
            )
            .unwrap();

        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory.reused, 20);
        assert_eq!(&trajectory.points[..20], pending.as_slice());
        // 22.37 mph is 0.2 per tick, so the spacing carries on unchanged
        for w in trajectory.points[19..].windows(2) {
            assert_abs_diff_eq!(w[1].0 - w[0].0, 0.2, epsilon = 1e-6);
            assert_abs_diff_eq!(w[1].1, -6.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn speed_ramp_is_bounded() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 0.0);
        let trajectory = TrajectoryGenerator::new()
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &[],
                    reference_s: ego.s,
                    lane: Lane::Center,
                    reference_velocity: 45.0,
                    speed_delta: 0.224,
                },
                &map,
            )
            .unwrap();

        let speeds = speeds(&trajectory.points);
        for w in speeds.windows(2) {
            assert!((w[1] - w[0]).abs() <= 0.224 + 1e-6);
        }
        assert!(speeds.iter().all(|&v| v <= 49.5 + 1e-6));
        assert_abs_diff_eq!(trajectory.final_velocity, 49.5, epsilon = 1e-12);
    }

    #[test]
    fn braking_never_reverses() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 0.0);
        let trajectory = TrajectoryGenerator::new()
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &[],
                    reference_s: ego.s,
                    lane: Lane::Center,
                    reference_velocity: 1.0,
                    speed_delta: -0.224,
                },
                &map,
            )
            .unwrap();
        assert_eq!(trajectory.final_velocity, 0.0);
        for w in trajectory.points.windows(2) {
            assert!(w[1].0 >= w[0].0);
        }
    }

    #[test]
    fn lane_change_moves_toward_target_lane() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 40.0);
        let trajectory = TrajectoryGenerator::new()
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &[],
                    reference_s: ego.s,
                    lane: Lane::Left,
                    reference_velocity: 40.0,
                    speed_delta: 0.0,
                },
                &map,
            )
            .unwrap();
        let last = trajectory.points[trajectory.len() - 1];
        // d = -y on this road; drifting from 6 toward 2
        assert!(-last.1 < 6.0);
        assert!(-last.1 > 2.0);
    }

    #[test]
    fn standstill_tail_uses_the_car_heading() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 0.0);
        let pending = [(100.0, -6.0); 40];
        let trajectory = TrajectoryGenerator::new()
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &pending,
                    reference_s: 100.0,
                    lane: Lane::Center,
                    reference_velocity: 0.0,
                    speed_delta: 0.224,
                },
                &map,
            )
            .unwrap();
        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory.reused, 40);
        assert_abs_diff_eq!(
            trajectory.points[40].0,
            100.0 + tick_distance(0.224, 0.02, 2.237),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(trajectory.points[40].1, -6.0, epsilon = 1e-9);
    }

    #[test]
    fn anchors_behind_the_car_are_degenerate() {
        let map = straight_map();
        let mut ego = ego_at(100.0, 6.0, 0.0);
        ego.yaw = std::f64::consts::PI;
        let err = TrajectoryGenerator::new()
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &[],
                    reference_s: 100.0,
                    lane: Lane::Center,
                    reference_velocity: 0.0,
                    speed_delta: 0.224,
                },
                &map,
            )
            .unwrap_err();
        assert!(matches!(err, PlannerError::DegenerateAnchors { .. }));
    }

    #[test]
    fn stop_extension_brakes_gradually() {
        let generator = TrajectoryGenerator::new();
        let ego = ego_at(100.0, 6.0, 49.5);
        // 20 points at about 49.5 mph along +x
        let spacing = tick_distance(49.5, 0.02, 2.237);
        let pending: Vec<Point2D> = (1..=20)
            .map(|i| (100.0 + i as f64 * spacing, -6.0))
            .collect();
        let trajectory = generator.stop_extension(&ego, &pending);

        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory.reused, 20);
        assert_eq!(&trajectory.points[..20], pending.as_slice());

        let mut chain = vec![(ego.x, ego.y)];
        chain.extend_from_slice(&trajectory.points);
        let speeds = speeds(&chain);
        for w in speeds.windows(2) {
            assert!((w[1] - w[0]).abs() <= 0.224 + 1e-6, "{} -> {}", w[0], w[1]);
        }
        assert!(trajectory.points[20..].iter().all(|p| (p.1 + 6.0).abs() < 1e-9));
        assert!(trajectory.points.windows(2).all(|w| w[1].0 >= w[0].0));
        assert_abs_diff_eq!(trajectory.final_velocity, 49.5 - 30.0 * 0.224, epsilon = 1e-6);
    }

    #[test]
    fn stop_extension_without_pending_starts_from_the_car() {
        let generator = TrajectoryGenerator::new();
        let ego = ego_at(100.0, 6.0, 1.0);
        let trajectory = generator.stop_extension(&ego, &[]);
        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory.final_velocity, 0.0);
        // 1.0 mph brakes to zero within five ticks, then holds
        let stop = trajectory.points[4];
        assert!(stop.0 > 100.0);
        assert!(trajectory.points[4..].iter().all(|&p| p == stop));
    }

    #[test]
    fn fitter_can_be_swapped() {
        let map = straight_map();
        let ego = ego_at(100.0, 6.0, 0.0);
        let generator = TrajectoryGenerator::new().with_fitter(PiecewiseLinearFitter);
        assert_eq!(generator.fitter_name(), "PiecewiseLinearFitter");
        let trajectory = generator
            .generate(
                &TrajectoryRequest {
                    ego: &ego,
                    pending: &[],
                    reference_s: ego.s,
                    lane: Lane::Center,
                    reference_velocity: 22.37,
                    speed_delta: 0.0,
                },
                &map,
            )
            .unwrap();
        let (xs, ys) = trajectory.to_xy();
        assert_abs_diff_eq!(xs[0], 100.2, epsilon = 1e-9);
        assert_abs_diff_eq!(xs[49], 110.0, epsilon = 1e-9);
        assert!(ys.iter().all(|&y| (y + 6.0).abs() < 1e-9));
    }
}
