use anyhow::Result;
use highway_core::common::lanes::Lane;
use highway_core::perception::TrackedVehicle;
use highway_core::simulation::{ring_road, OfflineDriver};
use highway_core::PlannerSession;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Points the car drives between two planning cycles
const CONSUMED_PER_CYCLE: usize = 10;
const CYCLES: usize = 150;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("highway_core=info".parse()?),
        )
        .init();

    println!("Initializing highway planner core...");

    let map = Arc::new(ring_road(800.0, 720)?);
    println!(
        "Ring road with {} waypoints, max_s = {:.1}",
        map.waypoint_sequence().len(),
        map.max_s()
    );

    let mut session = PlannerSession::new(Arc::clone(&map)).start()?;

    // Stationary car directly ahead in the center lane
    let blocker = TrackedVehicle {
        id: 0,
        vx: 0.0,
        vy: 0.0,
        s: 125.0,
        d: 6.0,
    };
    let mut driver =
        OfflineDriver::new(&map, 100.0, 6.0, CONSUMED_PER_CYCLE).with_traffic(vec![blocker]);

    let mut first_change = None;
    for cycle in 0..CYCLES {
        let input = driver.snapshot(&map);
        let output = session.plan_cycle(&input)?;

        if first_change.is_none() && output.decision.lane != Lane::Center {
            first_change = Some(cycle);
        }
        if cycle % 10 == 0 {
            println!(
                "cycle {:3}: s={:7.2} d={:5.2} speed={:5.2} mph lane={} flags={:?}",
                cycle,
                driver.ego.s,
                driver.ego.d,
                driver.ego.speed,
                session.state().current_lane.index(),
                output.flags
            );
        }

        driver.advance(&map, &output.trajectory.points);
    }

    match first_change {
        Some(cycle) => println!("Left the blocked lane at cycle {}", cycle),
        None => println!("Never left the blocked lane"),
    }
    println!(
        "Finished at s={:.2} d={:.2}, {:.2} mph after {} cycles",
        driver.ego.s,
        driver.ego.d,
        driver.ego.speed,
        session.cycles()
    );

    Ok(())
}
