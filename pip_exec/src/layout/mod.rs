//! # Layout module
//!
//! The coordinate model of the deck. Everything the robot can reach is described as a [`Layout`],
//! an ordered list of [`Matrix`] units (tip racks, well plates, tube racks), each of which is a
//! rectangular grid of [`Position`]s. A single grid position together with what is known about it
//! is a [`Cell`].
//!
//! Nothing in this module performs I/O.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use comms_if::tc::transfer::CellAddr;
use serde::{Deserialize, Serialize};

pub use params::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position in the machine frame.
///
/// Units: millimeters
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Describes the provenance of the liquid in a cell.
///
/// Maps the address of each cell that contributed liquid to the volume it contributed. Stocks
/// contribute themselves, mixtures contribute their own components in proportion.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Mixture {
    contents: BTreeMap<CellAddr, f64>,
}

/// The fundamental addressable unit, a tip slot or a well.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub kind: CellKind,

    /// True if the cell holds nothing usable. For tip cells this means the tip has been used.
    pub empty: bool,

    pub position: Position,

    /// The tracked content of the cell. Always `None` for tip cells.
    pub content: Option<Mixture>,
}

/// A rectangular grid of positions making up one piece of labware.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    name: String,
    kind: CellKind,
    home: Position,
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Position>>,
}

/// The ordered collection of matrices on the deck.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Layout {
    matrices: Vec<Matrix>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The kind of thing held in the cells of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Tip,
    Stock,
    Standard,
    Unknown,
}

/// Errors which can occur when resolving a cell address against a layout.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LayoutError {
    #[error("Matrix {index} does not exist, the layout has {len} matrices")]
    MatrixOutOfRange { index: usize, len: usize },

    #[error("Cell {addr} is outside of the {rows}x{cols} matrix")]
    CellOutOfRange {
        addr: CellAddr,
        rows: usize,
        cols: usize,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The same position at a different height.
    pub fn with_z(self, z: f64) -> Self {
        Self { z, ..self }
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Mixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume contributed by the given cell.
    pub fn add(&mut self, source: CellAddr, volume: f64) {
        *self.contents.entry(source).or_insert(0.0) += volume;
    }

    /// Add every component of another mixture.
    pub fn merge(&mut self, other: &Mixture) {
        for (source, volume) in other.components() {
            self.add(source, volume);
        }
    }

    /// A copy of this mixture with every component scaled so that the total is `volume`.
    pub fn scaled(&self, volume: f64) -> Mixture {
        let total = self.total();
        let mut out = Mixture::new();

        if total > 0.0 {
            for (source, v) in self.components() {
                out.add(source, v * volume / total);
            }
        }

        out
    }

    /// Total volume of the mixture.
    pub fn total(&self) -> f64 {
        self.contents.values().sum()
    }

    /// Fraction of the total volume contributed by the given cell, 0 if it did not contribute.
    pub fn fraction(&self, source: &CellAddr) -> f64 {
        let total = self.total();

        match self.contents.get(source) {
            Some(v) if total > 0.0 => v / total,
            _ => 0.0,
        }
    }

    /// Iterate over the contributing cells and their volumes, ordered by address.
    pub fn components(&self) -> impl Iterator<Item = (CellAddr, f64)> + '_ {
        self.contents.iter().map(|(a, v)| (*a, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= 0.0
    }
}

impl Matrix {
    /// Generate a new matrix.
    ///
    /// The cell at row `r` and column `c` is at `home + (c * col_spacing, r * row_spacing, 0)`.
    /// Zero rows or columns produce an empty grid.
    pub fn new(
        kind: CellKind,
        name: &str,
        home: Position,
        row_spacing: f64,
        col_spacing: f64,
        rows: usize,
        cols: usize,
    ) -> Self {
        let cells = (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| Position {
                        x: home.x + col as f64 * col_spacing,
                        y: home.y + row as f64 * row_spacing,
                        z: home.z,
                    })
                    .collect()
            })
            .collect();

        Self {
            name: name.to_string(),
            kind,
            home,
            rows,
            cols,
            cells,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn home(&self) -> Position {
        self.home
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells in the matrix.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The position of a cell, or `None` if it's outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<Position> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// All cell positions, indexed `[row][col]`.
    pub fn cells(&self) -> &[Vec<Position>] {
        &self.cells
    }

    /// Iterate over all cell positions in row-major order.
    pub fn iter_row_major(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().flat_map(|r| r.iter().copied())
    }
}

impl Layout {
    /// Create a new layout from an ordered list of matrices.
    ///
    /// No checks are made for overlapping matrices.
    pub fn new(matrices: Vec<Matrix>) -> Self {
        Self { matrices }
    }

    pub fn matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    /// Number of matrices in the layout.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn matrix(&self, index: usize) -> Result<&Matrix, LayoutError> {
        self.matrices.get(index).ok_or(LayoutError::MatrixOutOfRange {
            index,
            len: self.matrices.len(),
        })
    }

    /// Resolve a cell address into a position.
    pub fn position(&self, addr: &CellAddr) -> Result<Position, LayoutError> {
        let matrix = self.matrix(addr.matrix)?;

        matrix
            .cell(addr.row, addr.col)
            .ok_or(LayoutError::CellOutOfRange {
                addr: *addr,
                rows: matrix.rows,
                cols: matrix.cols,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn plate() -> Matrix {
        Matrix::new(
            CellKind::Standard,
            "96",
            Position::new(29.0, 17.0, 80.0),
            42.5 - 29.0,
            42.5 - 29.0,
            5,
            16,
        )
    }

    #[test]
    fn test_matrix_grid() {
        let home = Position::new(165.0, 103.5, 73.5);
        let (row_sp, col_sp) = (8.5, 9.0);
        let m = Matrix::new(CellKind::Tip, "tips", home, row_sp, col_sp, 12, 8);

        assert_eq!(m.len(), 96);
        assert_eq!(m.cells().len(), 12);
        for r in 0..12 {
            assert_eq!(m.cells()[r].len(), 8);
            for c in 0..8 {
                assert_eq!(
                    m.cell(r, c),
                    Some(Position::new(
                        home.x + c as f64 * col_sp,
                        home.y + r as f64 * row_sp,
                        home.z
                    ))
                );
            }
        }
        assert_eq!(m.cell(12, 0), None);
        assert_eq!(m.cell(0, 8), None);
    }

    #[test]
    fn test_matrix_scenario() {
        let m = plate();

        assert_eq!(m.cell(2, 3), Some(Position::new(69.5, 44.0, 80.0)));
        assert_eq!(m.cell(0, 0), Some(m.home()));
        assert_eq!(m.iter_row_major().nth(16), m.cell(1, 0));
    }

    #[test]
    fn test_empty_matrix() {
        let m = Matrix::new(CellKind::Stock, "none", Position::default(), 1.0, 1.0, 0, 4);

        assert!(m.is_empty());
        assert_eq!(m.cells().len(), 0);
        assert_eq!(m.iter_row_major().count(), 0);
        assert_eq!(m.cell(0, 0), None);
    }

    #[test]
    fn test_layout_resolution() {
        let layout = Layout::new(vec![plate(), plate()]);

        assert_eq!(
            layout.position(&CellAddr::new(1, 2, 3)),
            Ok(Position::new(69.5, 44.0, 80.0))
        );
        assert_eq!(
            layout.position(&CellAddr::new(2, 0, 0)),
            Err(LayoutError::MatrixOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            layout.position(&CellAddr::new(0, 5, 0)),
            Err(LayoutError::CellOutOfRange {
                addr: CellAddr::new(0, 5, 0),
                rows: 5,
                cols: 16
            })
        );
    }

    #[test]
    fn test_mixture() {
        let stock_a = CellAddr::new(0, 0, 0);
        let stock_b = CellAddr::new(0, 0, 1);

        let mut m = Mixture::new();
        assert!(m.is_empty());
        m.add(stock_a, 150.0);
        m.add(stock_b, 50.0);
        m.add(stock_a, 0.0);

        assert_eq!(m.total(), 200.0);
        assert_eq!(m.fraction(&stock_a), 0.75);
        assert_eq!(m.fraction(&CellAddr::new(1, 1, 1)), 0.0);

        // Taking 100 of the mixture takes the components in proportion
        let taken = m.scaled(100.0);
        assert_eq!(taken.components().collect::<Vec<_>>(), vec![(stock_a, 75.0), (stock_b, 25.0)]);

        let mut other = Mixture::new();
        other.add(stock_b, 50.0);
        other.merge(&taken);
        assert_eq!(other.fraction(&stock_b), 0.5);

        assert!(Mixture::new().scaled(10.0).is_empty());
    }
}
