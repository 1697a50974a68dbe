//! # Tip feed
//!
//! Hands out the positions of unused tips from a rack, in row-major order. Tips are never handed
//! out twice, and a feed cannot be rewound. When a rack is refilled a new feed is built over it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;

use crate::layout::{Matrix, Position};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Supply of tip positions from a single rack.
#[derive(Debug, Clone)]
pub struct TipFeed {
    rack: String,
    tips: Vec<Position>,
    cols: usize,

    /// Index of the next tip to hand out
    cursor: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TipFeedError {
    #[error("All {0} tips in rack {1:?} have been used")]
    Exhausted(usize, String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TipFeed {
    /// Build a feed over the given rack, skipping the first `tip_start` tips.
    pub fn new(rack: &Matrix, tip_start: usize) -> Self {
        let tips: Vec<Position> = rack.iter_row_major().collect();
        let cursor = tip_start.min(tips.len());

        debug!(
            "Tip feed over {:?}: {} tips, starting at {}",
            rack.name(),
            tips.len(),
            cursor
        );

        Self {
            rack: rack.name().to_string(),
            tips,
            cols: rack.cols(),
            cursor,
        }
    }

    /// Take the next unused tip.
    pub fn get_tip(&mut self) -> Result<Position, TipFeedError> {
        let tip = self.next_tip()?;
        self.cursor += 1;

        Ok(tip)
    }

    /// The tip [`TipFeed::get_tip`] would return, without taking it.
    pub fn next_tip(&self) -> Result<Position, TipFeedError> {
        self.peek()
            .ok_or_else(|| TipFeedError::Exhausted(self.tips.len(), self.rack.clone()))
    }

    /// The next unused tip, without taking it.
    pub fn peek(&self) -> Option<Position> {
        self.tips.get(self.cursor).copied()
    }

    /// Number of tips handed out or skipped so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.tips.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// True if the tip at the given slot has already been handed out or
    /// skipped. Slots outside the rack are never consumed.
    pub fn is_consumed(&self, row: usize, col: usize) -> bool {
        if col >= self.cols {
            return false;
        }

        match row.checked_mul(self.cols).and_then(|i| i.checked_add(col)) {
            Some(index) => index < self.tips.len() && index < self.cursor,
            None => false,
        }
    }

    pub fn rack_name(&self) -> &str {
        &self.rack
    }
}

impl Iterator for TipFeed {
    type Item = Position;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_tip().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
