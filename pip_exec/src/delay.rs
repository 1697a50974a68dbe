//! # Delay module
//!
//! All waits made while sequencing the robot go through a [`Delay`], so that the sequencing can be
//! driven without real time passing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which can block the control flow for a duration.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Delay by sleeping the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        if duration > Duration::from_secs(0) {
            thread::sleep(duration)
        }
    }
}
