//! Simulator message encoding and decoding

use crate::common::types::{Point2D, VehicleState};
use crate::common::units::deg_to_rad;
use crate::control::trajectory::Trajectory;
use crate::error::{PlannerError, Result};
use crate::perception::TrackedVehicle;
use crate::session::CycleInput;
use serde::Deserialize;
use serde_json::{json, Value};

/// Prefix of a socket.io event frame
const EVENT_PREFIX: &str = "42";

/// Entries per sensor fusion row: id, x, y, vx, vy, s, d
const SENSOR_FUSION_FIELDS: usize = 7;

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Telemetry(Box<Telemetry>),
    /// Event frame without usable data, the simulator is driven by hand
    Manual,
    /// Anything that is not an event frame, or an event we do not handle
    Ignored,
}

/// Telemetry payload as sent by the simulator
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Telemetry {
    pub x: f64,
    pub y: f64,
    pub s: f64,
    pub d: f64,
    /// Heading in degrees
    pub yaw: f64,
    /// Speed in mph
    pub speed: f64,
    pub previous_path_x: Vec<f64>,
    pub previous_path_y: Vec<f64>,
    pub end_path_s: f64,
    pub end_path_d: f64,
    pub sensor_fusion: Vec<Vec<f64>>,
}

impl Telemetry {
    /// Validate and convert into planner input
    pub fn into_cycle_input(self) -> Result<CycleInput> {
        if self.previous_path_x.len() != self.previous_path_y.len() {
            return Err(PlannerError::Telemetry(format!(
                "previous path has {} x values but {} y values",
                self.previous_path_x.len(),
                self.previous_path_y.len()
            )));
        }

        let pending: Vec<Point2D> = self
            .previous_path_x
            .iter()
            .copied()
            .zip(self.previous_path_y.iter().copied())
            .collect();

        let vehicles = self
            .sensor_fusion
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() < SENSOR_FUSION_FIELDS {
                    return Err(PlannerError::Telemetry(format!(
                        "sensor fusion row {} has {} fields, expected {}",
                        i,
                        row.len(),
                        SENSOR_FUSION_FIELDS
                    )));
                }
                Ok(TrackedVehicle {
                    id: row[0] as i64,
                    vx: row[3],
                    vy: row[4],
                    s: row[5],
                    d: row[6],
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CycleInput {
            ego: VehicleState {
                x: self.x,
                y: self.y,
                yaw: deg_to_rad(self.yaw),
                speed: self.speed,
                s: self.s,
                d: self.d,
            },
            pending,
            end_path_s: self.end_path_s,
            end_path_d: self.end_path_d,
            vehicles,
        })
    }
}

/// The JSON array inside an event frame, or `None` when there is no data
fn extract_payload(text: &str) -> Option<&str> {
    if text.contains("null") {
        return None;
    }
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode one text frame from the simulator
pub fn parse_message(text: &str) -> Result<Event> {
    if text.len() <= EVENT_PREFIX.len() || !text.starts_with(EVENT_PREFIX) {
        return Ok(Event::Ignored);
    }

    let payload = match extract_payload(text) {
        Some(payload) => payload,
        None => return Ok(Event::Manual),
    };

    let frame: Vec<Value> = serde_json::from_str(payload)?;
    let mut frame = frame.into_iter();
    let name = frame.next();

    match name.as_ref().and_then(Value::as_str) {
        Some("telemetry") => {
            let data = frame
                .next()
                .ok_or_else(|| PlannerError::Telemetry("telemetry event without data".into()))?;
            let telemetry: Telemetry = serde_json::from_value(data)?;
            Ok(Event::Telemetry(Box::new(telemetry)))
        }
        _ => Ok(Event::Ignored),
    }
}

/// Encode a trajectory as a `control` event
pub fn control_message(trajectory: &Trajectory) -> String {
    let (next_x, next_y) = trajectory.to_xy();
    let body = json!({ "next_x": next_x, "next_y": next_y });
    format!("{}[\"control\",{}]", EVENT_PREFIX, body)
}

/// Hand control back to the simulator's manual mode
pub fn manual_message() -> String {
    format!("{}[\"manual\",{{}}]", EVENT_PREFIX)
}
