//! # Motion control module
//!
//! Homing and sequencing of gantry moves. Every move is sent as a horizontal move followed by a
//! vertical move, and the controller's idea of where the head is (`current`) is updated as soon as
//! the commands are written. The controller only acknowledges homing, so the end of a move is
//! estimated from its length.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;

use crate::{layout::Position, transport::TransportError};

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MotionCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MotionCtrlError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("The controller did not behave as expected: {0}")]
    ProtocolViolation(String),

    #[error("Cannot move before the gantry has been homed")]
    NotHomed,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Estimate the time needed to travel in a straight line between two points
/// at the given rate.
///
/// A rate which is not positive gives a zero estimate.
pub fn time_est(start: Position, end: Position, rate: f64) -> Duration {
    let dist = util::maths::norm(&start.coords(), &end.coords()).unwrap_or(0.0);

    secs_to_duration(dist / rate)
}

/// Convert a number of seconds into a duration, treating anything which is not
/// a positive finite number as zero.
pub(crate) fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::from_secs(0)
    }
}
