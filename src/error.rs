//! Error types for the highway planner

use thiserror::Error;

/// Planner error type
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed waypoint row {line}: {reason}")]
    MapFormat { line: usize, reason: String },

    #[error("Malformed telemetry: {0}")]
    Telemetry(String),

    /// Spline anchors must be strictly increasing in the local frame
    #[error("Degenerate anchors: local x at index {index} is {x:.4}, previous was {previous_x:.4}")]
    DegenerateAnchors {
        index: usize,
        previous_x: f64,
        x: f64,
    },

    #[error("Curve fit failed: {0}")]
    CurveFit(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<toml::de::Error> for PlannerError {
    fn from(e: toml::de::Error) -> Self {
        PlannerError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(e: serde_json::Error) -> Self {
        PlannerError::Telemetry(e.to_string())
    }
}

impl From<csv::Error> for PlannerError {
    fn from(e: csv::Error) -> Self {
        let line = e
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or_default();
        PlannerError::MapFormat {
            line,
            reason: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
