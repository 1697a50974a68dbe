//! Parameters structure for the deck layout

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{CellKind, Layout, Matrix, Position};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Static description of the deck, loaded from `layout.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    /// The matrices on the deck, in layout order.
    pub matrices: Vec<MatrixParams>,
}

/// Description of a single matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixParams {
    pub name: String,

    pub kind: CellKind,

    /// Position of the cell at row 0, column 0.
    ///
    /// Units: millimeters
    pub home: Position,

    /// Distance between rows, along Y.
    ///
    /// Units: millimeters
    pub row_spacing_mm: f64,

    /// Distance between columns, along X.
    ///
    /// Units: millimeters
    pub col_spacing_mm: f64,

    pub rows: usize,

    pub cols: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LayoutParams {
    /// Generate the layout described by these parameters.
    pub fn build(&self) -> Layout {
        Layout::new(self.matrices.iter().map(MatrixParams::build).collect())
    }
}

impl MatrixParams {
    pub fn build(&self) -> Matrix {
        Matrix::new(
            self.kind,
            &self.name,
            self.home,
            self.row_spacing_mm,
            self.col_spacing_mm,
            self.rows,
            self.cols,
        )
    }
}

impl Default for LayoutParams {
    /// The bench layout: three 5x16 plates and a 5x16 tip rack last, all sharing one footprint.
    fn default() -> Self {
        let plate = |name: &str, kind: CellKind| MatrixParams {
            name: name.to_string(),
            kind,
            home: Position::new(29.0, 17.0, 80.0),
            row_spacing_mm: 42.5 - 29.0,
            col_spacing_mm: 42.5 - 29.0,
            rows: 5,
            cols: 16,
        };

        Self {
            matrices: vec![
                plate("purp", CellKind::Stock),
                plate("96", CellKind::Standard),
                plate("12", CellKind::Standard),
                plate("tips", CellKind::Tip),
            ],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_params() {
        let params: LayoutParams = util::params::from_str(
            r#"
            [[matrices]]
            name = "stocks"
            kind = "stock"
            home = { x = 10.0, y = 20.0, z = 75.0 }
            row_spacing_mm = 18.0
            col_spacing_mm = 18.0
            rows = 2
            cols = 6

            [[matrices]]
            name = "tips"
            kind = "tip"
            home = { x = 165.0, y = 103.5, z = 73.5 }
            row_spacing_mm = 8.5
            col_spacing_mm = 8.5
            rows = 12
            cols = 8
            "#,
        )
        .unwrap();

        let layout = params.build();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.matrices()[0].kind(), CellKind::Stock);
        assert_eq!(layout.matrices()[0].cell(1, 2), Some(Position::new(46.0, 38.0, 75.0)));
        assert_eq!(layout.matrices()[1].name(), "tips");
        assert_eq!(layout.matrices()[1].len(), 96);
    }

    #[test]
    fn test_default_layout() {
        let layout = LayoutParams::default().build();

        assert_eq!(layout.len(), 4);
        assert_eq!(layout.matrices()[3].kind(), CellKind::Tip);
        assert_eq!(layout.matrices()[0].cell(2, 3), Some(Position::new(69.5, 44.0, 80.0)));
    }
}
