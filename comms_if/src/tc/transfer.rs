//! # Transfer telecommands
//!
//! A transfer moves a volume of liquid from one cell of the layout to another using a fresh tip.
//! Recipes are ordered lists of transfers, stored as JSON.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, str::FromStr};
use structopt::StructOpt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The address of a single cell in the layout.
///
/// `matrix` is the index of the matrix in the layout, `row` and `col` index the cell within that
/// matrix. On the command line an address is written `matrix:row:col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddr {
    pub matrix: usize,
    pub row: usize,
    pub col: usize,
}

/// A request to transfer liquid between two cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct TransferRequest {
    /// The cell to aspirate from, as `matrix:row:col`.
    pub source: CellAddr,

    /// The cell to dispense into, as `matrix:row:col`.
    pub dest: CellAddr,

    /// The volume to transfer.
    ///
    /// Units: actuator volume units, 10 per unit of actuator travel.
    pub volume: f64,

    /// Eject the tip once the transfer is complete.
    #[structopt(long)]
    #[serde(default)]
    pub eject: bool,
}

/// An ordered list of transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Name of the recipe, used for reporting only.
    pub name: String,

    /// The transfers to perform, in order.
    pub transfers: Vec<TransferRequest>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Response to a single transfer request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferResponse {
    /// The transfer completed.
    Done,

    /// The transfer was rejected before the robot moved. The session is still usable.
    Rejected { reason: String },
}

/// Errors which can occur when parsing a [`CellAddr`].
#[derive(Debug, Error, PartialEq)]
pub enum CellAddrParseError {
    #[error("Expected a cell address of the form matrix:row:col, got {0:?}")]
    InvalidFormat(String),

    #[error("Invalid index {0:?} in cell address")]
    InvalidIndex(String),
}

/// Errors which can occur when loading a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Could not load the recipe: {0}")]
    LoadError(std::io::Error),

    #[error("Recipe contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Recipe {0:?} contains no transfers")]
    Empty(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CellAddr {
    pub fn new(matrix: usize, row: usize, col: usize) -> Self {
        Self { matrix, row, col }
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.matrix, self.row, self.col)
    }
}

impl FromStr for CellAddr {
    type Err = CellAddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();

        if parts.len() != 3 {
            return Err(CellAddrParseError::InvalidFormat(s.to_string()));
        }

        let mut idx = [0usize; 3];
        for (i, part) in parts.iter().enumerate() {
            idx[i] = part
                .parse()
                .map_err(|_| CellAddrParseError::InvalidIndex(part.to_string()))?;
        }

        Ok(Self::new(idx[0], idx[1], idx[2]))
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({}", self.source, self.dest, self.volume)?;
        if self.eject {
            write!(f, ", eject")?;
        }
        write!(f, ")")
    }
}

impl Recipe {
    /// Parse a recipe from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, RecipeError> {
        let recipe: Recipe = serde_json::from_str(json_str).map_err(RecipeError::InvalidJson)?;

        if recipe.transfers.is_empty() {
            return Err(RecipeError::Empty(recipe.name));
        }

        Ok(recipe)
    }

    /// Load a recipe from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecipeError> {
        let json_str = fs::read_to_string(path).map_err(RecipeError::LoadError)?;

        Self::from_json(&json_str)
    }
}
