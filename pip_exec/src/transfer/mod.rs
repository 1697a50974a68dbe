//! # Transfer module
//!
//! The [`Bot`] owns a session with the robot and composes motion, tip and liquid handling into
//! complete transfers. A transfer is
//!
//! 1. fetch a fresh tip and raise to the tip-on clearance height,
//! 2. move over the source and aspirate, then raise,
//! 3. move over the destination, dispense and let it settle, then raise,
//! 4. draw the cushion back in,
//! 5. optionally strip the tip.
//!
//! Requests which reference cells outside the layout, or which arrive once the tips have run out,
//! are refused before anything moves and leave the session usable. Any other failure leaves the
//! machine in an unknown state, and the session must be abandoned.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::{
    layout::LayoutError, liquid_ctrl::LiquidCtrlError, motion_ctrl::MotionCtrlError,
    tip_feed::TipFeedError, transport::TransportError,
};
use comms_if::tc::transfer::TransferResponse;

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of running a list of transfers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// One response for each request processed, in order.
    pub responses: Vec<TransferResponse>,

    /// The error which ended the run early, if any.
    pub fatal_error: Option<String>,

    /// Number of tips handed out by the end of the run, including skipped
    /// tips.
    pub tip_cursor: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors from the bot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("The controller did not behave as expected: {0}")]
    ProtocolViolation(String),

    #[error("The gantry has not been homed")]
    NotHomed,

    #[error("The bot has not been initialised")]
    NotInitialised,

    #[error("Liquid handling out of sequence: {0}")]
    OutOfSequence(String),

    #[error("No tips left: {0}")]
    ExhaustedTipFeed(#[from] TipFeedError),

    #[error("Invalid layout reference: {0}")]
    InvalidLayoutReference(String),

    #[error("Volume must be a non-negative number, got {0}")]
    InvalidVolume(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BotError {
    /// Fatal errors leave the machine in an unknown state and end the session.
    /// Other errors only reject the request that caused them.
    pub fn is_fatal(&self) -> bool {
        match self {
            BotError::ExhaustedTipFeed(_)
            | BotError::InvalidLayoutReference(_)
            | BotError::InvalidVolume(_) => false,
            _ => true,
        }
    }
}

impl From<LayoutError> for BotError {
    fn from(e: LayoutError) -> Self {
        BotError::InvalidLayoutReference(e.to_string())
    }
}

impl From<MotionCtrlError> for BotError {
    fn from(e: MotionCtrlError) -> Self {
        match e {
            MotionCtrlError::Transport(e) => BotError::Transport(e),
            MotionCtrlError::ProtocolViolation(s) => BotError::ProtocolViolation(s),
            MotionCtrlError::NotHomed => BotError::NotHomed,
        }
    }
}

impl From<LiquidCtrlError> for BotError {
    fn from(e: LiquidCtrlError) -> Self {
        match e {
            LiquidCtrlError::Transport(e) => BotError::Transport(e),
            LiquidCtrlError::InvalidVolume(v) => BotError::InvalidVolume(v),
            e @ LiquidCtrlError::OutOfSequence { .. } | e @ LiquidCtrlError::VolumeMismatch { .. } => {
                BotError::OutOfSequence(e.to_string())
            }
        }
    }
}

impl RunReport {
    /// Number of requests which completed.
    pub fn num_done(&self) -> usize {
        self.responses
            .iter()
            .filter(|r| **r == TransferResponse::Done)
            .count()
    }

    /// Number of requests which were refused.
    pub fn num_rejected(&self) -> usize {
        self.responses.len() - self.num_done()
    }
}
