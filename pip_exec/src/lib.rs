//! # PipBot library.
//!
//! Control core for the PipBot liquid handling robot. This library allows other crates in the
//! workspace to access items defined inside the pip crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Delay - blocking waits, replaceable so sequencing can run without real time passing
pub mod delay;

/// Layout module - positions, cells, matrices and the layout of the deck
pub mod layout;

/// Liquid control module - aspirate, dispense and cushion handling on the actuator
pub mod liquid_ctrl;

/// Motion control module - homing and gantry moves
pub mod motion_ctrl;

/// Executable parameters
pub mod params;

/// Tip feed - supplies unused tips from the tip rack
pub mod tip_feed;

/// Transfer module - the bot session and the full transfer sequence
pub mod transfer;

/// Transport - line oriented serial link to the controller
pub mod transport;
