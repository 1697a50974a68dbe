//! Parameters structure for the transfer sequence

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Index of the tip rack in the layout. The last matrix is used when not
    /// set.
    pub tip_rack: Option<usize>,

    /// Height to travel at while a tip is mounted.
    ///
    /// Units: millimeters
    pub tip_on_clear_z_mm: f64,

    /// Height to travel at without a tip.
    ///
    /// Units: millimeters
    pub tip_off_clear_z_mm: f64,

    /// Time allowed for liquid to leave the tip after dispensing.
    ///
    /// Units: seconds
    pub dispense_settle_s: f64,

    /// Volume cycled through the actuator at startup to prime it. Set to zero
    /// to skip priming.
    pub prime_volume: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            tip_rack: None,
            tip_on_clear_z_mm: 142.0,
            tip_off_clear_z_mm: 85.0,
            dispense_settle_s: 1.0,
            prime_volume: 300.0,
        }
    }
}
