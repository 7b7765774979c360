//! Planner session: one vehicle, one carried state
//!
//! A session owns the only memory that survives between cycles, the lane the
//! car is committed to and the velocity at the end of the last emitted
//! trajectory. Each telemetry event is planned to completion before the next
//! one is read, so the state needs no locking as long as every connection
//! owns its own session.

use crate::behaviors::{BehaviorDecision, BehaviorPlanner};
use crate::bridge::protocol::{self, Event};
use crate::common::lanes::Lane;
use crate::common::types::{Point2D, VehicleState};
use crate::config::PlannerConfig;
use crate::control::trajectory::{Trajectory, TrajectoryGenerator, TrajectoryRequest};
use crate::error::{PlannerError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State, Transition};
use crate::navigation::RoadMap;
use crate::perception::{TrackedVehicle, TrafficFlags, TrafficObserver};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State carried from one cycle to the next
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerState {
    pub current_lane: Lane,
    /// Velocity at the end of the last emitted trajectory, in mph
    pub reference_velocity: f64,
}

impl PlannerState {
    pub fn new(lane: Lane) -> Self {
        PlannerState {
            current_lane: lane,
            reference_velocity: 0.0,
        }
    }
}

impl Default for PlannerState {
    fn default() -> Self {
        Self::new(Lane::Center)
    }
}

/// One telemetry snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CycleInput {
    pub ego: VehicleState,
    pub pending: Vec<Point2D>,
    pub end_path_s: f64,
    pub end_path_d: f64,
    pub vehicles: Vec<TrackedVehicle>,
}

/// Result of one planning cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub trajectory: Trajectory,
    pub flags: TrafficFlags,
    pub decision: BehaviorDecision,
    /// True when the spline could not be fitted and the car was told to brake
    pub fallback: bool,
}

/// Planner for a single simulated vehicle
#[derive(Debug)]
pub struct PlannerSession {
    base: LifecycleNodeBase,
    map: Arc<RoadMap>,
    state: PlannerState,
    initial_lane: Lane,
    observer: TrafficObserver,
    behavior: BehaviorPlanner,
    generator: TrajectoryGenerator,
    cycles: u64,
}

impl PlannerSession {
    /// Create a session with default parameters
    pub fn new(map: Arc<RoadMap>) -> Self {
        Self::from_config(map, &PlannerConfig::default())
    }

    pub fn from_config(map: Arc<RoadMap>, config: &PlannerConfig) -> Self {
        let initial_lane = Lane::from_index(config.behavior.initial_lane).unwrap_or(Lane::Center);
        let observer = TrafficObserver::from_config(&config.road, &config.behavior)
            .with_track_length(map.max_s());

        PlannerSession {
            base: LifecycleNodeBase::new("planner_session"),
            map,
            state: PlannerState::new(initial_lane),
            initial_lane,
            observer,
            behavior: BehaviorPlanner::from_config(&config.behavior),
            generator: TrajectoryGenerator::from_config(
                &config.trajectory,
                &config.road,
                &config.behavior,
            ),
            cycles: 0,
        }
    }

    /// Replace the trajectory generator, e.g. to use another curve fitter
    pub fn with_generator(mut self, generator: TrajectoryGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Configure and activate in one go
    pub fn start(mut self) -> Result<Self> {
        self.on_configure()?;
        self.on_activate()?;
        Ok(self)
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn lifecycle_state(&self) -> State {
        self.base.state()
    }

    pub fn map(&self) -> &RoadMap {
        &self.map
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full planning cycle and commit the new state
    pub fn plan_cycle(&mut self, input: &CycleInput) -> Result<CycleOutput> {
        if !self.base.is_active() {
            return Err(PlannerError::InvalidState(format!(
                "{} is {:?}, not Active",
                self.base.name,
                self.base.state()
            )));
        }

        let pending = input.pending.as_slice();
        let reference_s = if pending.is_empty() {
            input.ego.s
        } else {
            input.end_path_s
        };
        let elapsed = pending.len() as f64 * self.generator.tick_seconds();

        let flags = self.observer.observe(
            reference_s,
            self.state.current_lane,
            &input.vehicles,
            elapsed,
        );
        let decision = self.behavior.decide(
            flags,
            self.state.current_lane,
            self.state.reference_velocity,
        );

        if decision.changes_lane(self.state.current_lane) {
            info!(
                "Changing from {} to {} at s={:.1} ({:?})",
                self.state.current_lane, decision.lane, reference_s, flags
            );
        }

        let request = TrajectoryRequest {
            ego: &input.ego,
            pending,
            reference_s,
            lane: decision.lane,
            reference_velocity: self.state.reference_velocity,
            speed_delta: decision.speed_delta,
        };

        let (trajectory, fallback) = match self.generator.generate(&request, &self.map) {
            Ok(trajectory) => (trajectory, false),
            Err(e @ (PlannerError::DegenerateAnchors { .. } | PlannerError::CurveFit(_))) => {
                warn!("Spline fit failed, braking along the pending path: {}", e);
                (self.generator.stop_extension(&input.ego, pending), true)
            }
            Err(e) => return Err(e),
        };

        self.state.current_lane = decision.lane;
        self.state.reference_velocity = trajectory.final_velocity;
        self.cycles += 1;

        debug!(
            "Cycle {}: {} pending, lane {}, velocity {:.2} mph, {:?}",
            self.cycles,
            pending.len(),
            decision.lane.index(),
            self.state.reference_velocity,
            flags
        );

        Ok(CycleOutput {
            trajectory,
            flags,
            decision,
            fallback,
        })
    }

    /// Answer one raw simulator message
    ///
    /// Returns `None` for messages that need no reply. Malformed telemetry and
    /// planning errors are answered with a manual-mode message and leave the
    /// carried state untouched.
    pub fn handle_message(&mut self, text: &str) -> Option<String> {
        let event = match protocol::parse_message(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping cycle: {}", e);
                return Some(protocol::manual_message());
            }
        };

        match event {
            Event::Telemetry(telemetry) => {
                let reply = telemetry
                    .into_cycle_input()
                    .and_then(|input| self.plan_cycle(&input));
                match reply {
                    Ok(output) => Some(protocol::control_message(&output.trajectory)),
                    Err(e) => {
                        warn!("Skipping cycle: {}", e);
                        Some(protocol::manual_message())
                    }
                }
            }
            Event::Manual => Some(protocol::manual_message()),
            Event::Ignored => None,
        }
    }
}

impl LifecycleNode for PlannerSession {
    fn on_configure(&mut self) -> Result<()> {
        self.base.check(Transition::Configure)?;
        if self.map.waypoint_sequence().is_empty() {
            return Err(PlannerError::Config("road map has no waypoints".into()));
        }
        info!(
            "Configuring {} ({} waypoints, fitter {})",
            self.base.name,
            self.map.waypoint_sequence().len(),
            self.generator.fitter_name()
        );
        self.base.transition(Transition::Configure)?;
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        self.base.transition(Transition::Activate)?;
        info!(
            "Activating {} in {} at {:.1} mph",
            self.base.name, self.state.current_lane, self.state.reference_velocity
        );
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        self.base.transition(Transition::Deactivate)?;
        info!("Deactivating {} after {} cycles", self.base.name, self.cycles);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        self.base.transition(Transition::Cleanup)?;
        info!("Cleaning up {}", self.base.name);
        self.state = PlannerState::new(self.initial_lane);
        self.cycles = 0;
        Ok(())
    }
}
