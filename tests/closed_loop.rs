//! Closed-loop driving against the offline simulator

use highway_core::common::lanes::Lane;
use highway_core::common::types::Point2D;
use highway_core::perception::TrackedVehicle;
use highway_core::simulation::{ring_road, straight_road, OfflineDriver};
use highway_core::{PlannerConfig, PlannerSession, RoadMap};
use std::sync::Arc;

const CONSUMED_PER_CYCLE: usize = 10;

/// Implied speed in mph between consecutive points
fn implied_speeds(points: &[Point2D]) -> Vec<f64> {
    points
        .windows(2)
        .map(|w| {
            let dist = ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt();
            dist / 0.02 * 2.237
        })
        .collect()
}

fn stationary(s: f64, d: f64) -> TrackedVehicle {
    TrackedVehicle {
        id: 3,
        vx: 0.0,
        vy: 0.0,
        s,
        d,
    }
}

#[test]
fn stationary_car_ahead_is_passed_on_the_left() {
    let map = Arc::new(straight_road(3000.0, 30.0).unwrap());
    let mut session = PlannerSession::new(Arc::clone(&map)).start().unwrap();
    let mut driver = OfflineDriver::new(&map, 100.0, 6.0, CONSUMED_PER_CYCLE)
        .with_traffic(vec![stationary(125.0, 6.0)]);

    let mut min_d = f64::MAX;
    let mut speed_at = Vec::new();
    for cycle in 0..60 {
        let input = driver.snapshot(&map);
        let output = session.plan_cycle(&input).unwrap();

        if cycle == 0 {
            assert!(output.flags.car_ahead);
            assert_eq!(output.decision.lane, Lane::Left);
        }
        assert!(!output.fallback);
        assert_eq!(output.trajectory.len(), 50);
        if let Some(&first_pending) = input.pending.first() {
            assert_eq!(output.trajectory.points[0], first_pending);
        }

        driver.advance(&map, &output.trajectory.points);
        min_d = min_d.min(driver.ego.d);
        speed_at.push(driver.ego.speed);
    }

    assert!(min_d < 3.5, "never moved into the left lane, min d = {min_d}");
    assert!(speed_at[5] > 0.0);
    assert!(speed_at[20] > speed_at[5]);
}

#[test]
fn mirrored_side_window_commits_to_the_pass() {
    // Neighbour window 20 behind and 30 ahead keeps the car ahead flagged
    // while it is still 25 away, so the planner never dithers
    let mut config = PlannerConfig::default();
    config.behavior.side_gap_behind = 20.0;
    config.behavior.side_gap_ahead = 30.0;

    let map = Arc::new(straight_road(3000.0, 30.0).unwrap());
    let mut session = PlannerSession::from_config(Arc::clone(&map), &config)
        .start()
        .unwrap();
    let mut driver = OfflineDriver::new(&map, 100.0, 6.0, CONSUMED_PER_CYCLE)
        .with_traffic(vec![stationary(125.0, 6.0)]);

    for _ in 0..10 {
        let input = driver.snapshot(&map);
        let output = session.plan_cycle(&input).unwrap();
        assert_eq!(output.decision.lane, Lane::Left);
        driver.advance(&map, &output.trajectory.points);
    }
}

#[test]
fn trajectories_stay_continuous_and_within_limits() {
    let map = Arc::new(straight_road(5000.0, 30.0).unwrap());
    let mut session = PlannerSession::new(Arc::clone(&map)).start().unwrap();
    let mut driver = OfflineDriver::new(&map, 100.0, 6.0, CONSUMED_PER_CYCLE);

    for _ in 0..80 {
        let input = driver.snapshot(&map);
        let output = session.plan_cycle(&input).unwrap();
        let points = &output.trajectory.points;

        if let Some(&first_pending) = input.pending.first() {
            assert_eq!(points[0], first_pending);
            assert_eq!(&points[..input.pending.len()], input.pending.as_slice());
        }

        let mut chain = vec![(driver.ego.x, driver.ego.y)];
        chain.extend_from_slice(points);
        let speeds = implied_speeds(&chain);
        for w in speeds.windows(2) {
            assert!(
                (w[1] - w[0]).abs() <= 0.224 + 1e-6,
                "speed jumped from {} to {}",
                w[0],
                w[1]
            );
        }
        assert!(speeds.iter().all(|&v| v <= 49.5 + 1e-6));

        driver.advance(&map, points);
    }

    assert!((session.state().reference_velocity - 49.5).abs() < 1e-9);
    assert!((driver.ego.d - 6.0).abs() < 1e-6);
}

fn drive_ring(map: &Arc<RoadMap>, start_s: f64, cycles: usize) -> (OfflineDriver, PlannerSession) {
    let mut session = PlannerSession::new(Arc::clone(map)).start().unwrap();
    let mut driver = OfflineDriver::new(map, start_s, 6.0, CONSUMED_PER_CYCLE);
    for _ in 0..cycles {
        let input = driver.snapshot(map);
        let output = session.plan_cycle(&input).unwrap();
        assert!(!output.fallback);
        assert_eq!(output.trajectory.len(), 50);
        driver.advance(map, &output.trajectory.points);
    }
    (driver, session)
}

#[test]
fn lane_keeping_through_the_seam_of_a_ring_road() {
    let map = Arc::new(ring_road(800.0, 720).unwrap());
    let start_s = map.max_s() - 150.0;
    let (driver, session) = drive_ring(&map, start_s, 120);

    // Travelled past the seam and back to small s
    assert!(driver.ego.s < start_s);
    assert!(driver.ego.s > 100.0);
    assert!((driver.ego.d - 6.0).abs() < 0.3, "drifted to d = {}", driver.ego.d);
    assert!(driver.ego.speed > 45.0 && driver.ego.speed < 50.5);
    assert_eq!(session.state().current_lane, Lane::Center);
}
