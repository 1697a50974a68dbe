//! # Communications interface crate.
//!
//! Provides the interfaces shared between the liquid handling core and the things it talks to: the
//! command set understood by the robot controller, and the transfer requests that recipes are made
//! of.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Transfer requests and recipes, the "telecommands" of the liquid handler
pub mod tc;

/// Command and response definitions for equipment (the motion/actuator controller)
pub mod eqpt;
