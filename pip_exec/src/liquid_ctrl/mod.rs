//! # Liquid control module
//!
//! Aspirate and dispense primitives for the pipette actuator. The actuator is driven in absolute
//! mode, so the module keeps track of the logical actuator position and turns each relative
//! travel into an absolute target.
//!
//! A transfer always runs the cycle `pickup -> dispense -> reset_cush`, anything else is refused.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::transport::TransportError;

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LiquidCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum LiquidCtrlError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Cannot {action} while the actuator is {state:?}")]
    OutOfSequence {
        action: &'static str,
        state: LiquidState,
    },

    #[error("Volume must be a non-negative number, got {0}")]
    InvalidVolume(f64),

    #[error("Cannot dispense {requested} while holding {aspirated}")]
    VolumeMismatch { aspirated: f64, requested: f64 },
}
