//! Grid geometry: positions and axis-aligned rectangles.

use serde::{Deserialize, Serialize};

/// A tile coordinate on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Row index (0 at the top).
    pub row: usize,
    /// Column index (0 at the left).
    pub col: usize,
}

impl Position {
    /// Create a new position.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Chebyshev (king-move) distance to another tile.
    pub const fn chebyshev(self, other: Self) -> usize {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        if dr > dc { dr } else { dc }
    }

    /// Squared Euclidean distance to another tile.
    pub const fn distance_sq(self, other: Self) -> usize {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        dr.saturating_mul(dr).saturating_add(dc.saturating_mul(dc))
    }

    /// Whether the two tiles touch (including diagonals) and are distinct.
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.chebyshev(other) == 1
    }

    /// Offset this position by a signed delta, returning `None` when the
    /// result would leave a `rows` x `cols` grid.
    pub fn offset(self, dr: isize, dc: isize, rows: usize, cols: usize) -> Option<Self> {
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < rows && col < cols).then_some(Self { row, col })
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// An axis-aligned rectangle in tile coordinates.
///
/// `x` is the first column, `y` the first row. A rectangle with zero width or
/// height covers no tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// First column covered.
    pub x: usize,
    /// First row covered.
    pub y: usize,
    /// Number of columns covered.
    pub width: usize,
    /// Number of rows covered.
    pub height: usize,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle covers the given tile.
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.y
            && col >= self.x
            && row < self.y.saturating_add(self.height)
            && col < self.x.saturating_add(self.width)
    }

    /// Whether the rectangle covers no tiles.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
