//! Bridge to the driving simulator
//!
//! The simulator speaks a socket.io style framing over WebSocket: text frames
//! starting with `42` carry a JSON array `[event, payload]`.
pub mod protocol;

pub use self::protocol::{control_message, manual_message, parse_message, Event, Telemetry};
