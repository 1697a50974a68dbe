//! Parameters structure for MotionCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::layout::Position;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for motion control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- RATES ----

    /// Feed rate sent with every gantry move, also used to estimate the
    /// duration of horizontal moves.
    ///
    /// Units: millimeters/second
    pub feed_rate: f64,

    /// Rate used to estimate the duration of vertical moves.
    ///
    /// Units: millimeters/second
    pub vertical_rate: f64,

    // ---- POSITIONS ----

    /// Safe travel position used to park the head.
    pub clear_pos: Position,

    /// X position of the tip stripper.
    ///
    /// Units: millimeters
    pub eject_x_mm: f64,

    /// Height the head is raised to before stripping the tip.
    ///
    /// Units: millimeters
    pub eject_raise_z_mm: f64,

    /// Height the head drops to in order to strip the tip.
    ///
    /// Units: millimeters
    pub eject_strip_z_mm: f64,

    // ---- HOMING ----

    /// Maximum time to wait for the controller to report homing complete.
    /// No limit when not set.
    ///
    /// Units: seconds
    pub home_timeout_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            feed_rate: 500.0,
            vertical_rate: 10.0,
            clear_pos: Position::new(0.0, 0.0, 85.0),
            eject_x_mm: 10.0,
            eject_raise_z_mm: 156.0,
            eject_strip_z_mm: 85.0,
            home_timeout_s: None,
        }
    }
}
