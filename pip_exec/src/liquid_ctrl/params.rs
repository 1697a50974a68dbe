//! Parameters structure for LiquidCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the liquid handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Extra volume pushed out after every dispense to clear the tip, and
    /// drawn back in afterwards.
    pub cushion: f64,

    /// Feed rate sent with every actuator move.
    pub actuator_feed_rate: f64,

    /// Time allowed for the actuator to finish a move.
    ///
    /// Units: milliseconds
    pub settle_ms: u64,

    /// Volume moved by one unit of actuator travel.
    pub volume_per_unit: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            cushion: 25.0,
            actuator_feed_rate: 500.0,
            settle_ms: 500,
            volume_per_unit: 10.0,
        }
    }
}
