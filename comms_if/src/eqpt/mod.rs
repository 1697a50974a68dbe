//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to equipment over the serial
//! link.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// G-code command set of the pipetting robot's controller
pub mod pip;
