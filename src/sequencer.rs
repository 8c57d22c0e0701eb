//! Red/black traversal order.
//!
//! Interior cells are split by the parity of `row + col`. All cells of one
//! colour only neighbour cells of the other colour, so a whole colour can be
//! relaxed at once. For a grid of dimension 6 (`E` even, `O` odd, `X` fixed):
//!
//! ```text
//!   X X X X X X
//!   X E O E O X
//!   X O E O E X
//!   X E O E O X
//!   X O E O E X
//!   X X X X X X
//! ```
//!
//! A pass walks one colour row by row, stepping two columns at a time.

use crate::{types::Coord, utils::Parity};
use derive_more::Display;

/// Parity class of an interior cell.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Color {
    /// `row + col` is even. Always relaxed first.
    #[display("even")]
    Even,
    /// `row + col` is odd.
    #[display("odd")]
    Odd,
}

impl Color {
    /// Colour of the cell at `coord`.
    #[must_use]
    pub const fn of(coord: Coord) -> Self {
        if (coord.row + coord.col) % 2 == 0 {
            Self::Even
        } else {
            Self::Odd
        }
    }

    /// The other colour.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Even => Self::Odd,
            Self::Odd => Self::Even,
        }
    }

    /// First column visited on row 1.
    const fn first_col(self) -> usize {
        match self {
            Self::Even => 1,
            Self::Odd => 2,
        }
    }
}

/// Sequencing position of the orchestrator: the current point and colour.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Cursor {
    dimension: usize,
    row: usize,
    col: usize,
    color: Color,
}

impl Cursor {
    /// Cursor on the first even point, `(1, 1)`.
    ///
    /// # Panics
    /// If `dimension < 3`.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self::at_pass_start(dimension, Color::Even)
    }

    /// Cursor on the first point of a `color` pass.
    ///
    /// # Panics
    /// If `dimension < 3`.
    #[must_use]
    pub fn at_pass_start(dimension: usize, color: Color) -> Self {
        assert!(dimension >= 3, "Cursor::at_pass_start: dimension {dimension}");
        Self {
            dimension,
            row: 1,
            col: color.first_col(),
            color,
        }
    }

    /// Colour of the current pass.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Current point, or `None` if this pass has no interior point at all
    /// (the odd pass of a 3x3 grid).
    #[must_use]
    pub const fn current(&self) -> Option<Coord> {
        if self.col > self.dimension - 2 {
            return None;
        }
        Some(Coord::new(self.row, self.col))
    }

    /// Whether the current point ends its pass: `(N-2, N-2)` for even passes,
    /// `(N-2, N-3)` for odd ones.
    #[must_use]
    pub const fn is_last_of_pass(&self) -> bool {
        let last_col = match self.color {
            Color::Even => self.dimension - 2,
            Color::Odd => self.dimension - 3,
        };
        self.row == self.dimension - 2 && self.col == last_col
    }

    /// Step to the next point of the same colour.
    ///
    /// Reaching the last or second-to-last interior column wraps to the next
    /// row. The restart column depends on which of the two was hit and on the
    /// parity of the dimension, so that the colour is preserved.
    pub fn advance(&mut self) {
        let dimension = self.dimension;
        if self.col == dimension - 2 {
            self.col = if dimension.is_even() { 1 } else { 2 };
            self.row += 1;
        } else if self.col == dimension - 3 {
            self.col = if dimension.is_even() { 2 } else { 1 };
            self.row += 1;
        } else {
            self.col += 2;
        }
    }

    /// Flip the colour and rewind to row 1.
    pub fn next_pass(&mut self) {
        *self = Self::at_pass_start(self.dimension, self.color.flip());
    }
}

/// Lazy, finite sequence of all interior points of one colour.
///
/// Restartable: build a new one with [`pass_points`] for the next pass.
#[derive(Debug, Clone)]
pub struct PassPoints {
    cursor: Cursor,
    done: bool,
}

impl Iterator for PassPoints {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        if self.done {
            return None;
        }
        let Some(coord) = self.cursor.current() else {
            self.done = true;
            return None;
        };
        if self.cursor.is_last_of_pass() {
            self.done = true;
        } else {
            self.cursor.advance();
        }
        Some(coord)
    }
}

/// All interior points of `color` in a grid of `dimension`, in visiting order.
///
/// # Panics
/// If `dimension < 3`.
#[must_use]
pub fn pass_points(dimension: usize, color: Color) -> PassPoints {
    PassPoints {
        cursor: Cursor::at_pass_start(dimension, color),
        done: false,
    }
}

/// A full sweep: the even pass followed by the odd pass.
///
/// # Panics
/// If `dimension < 3`.
pub fn sweep(dimension: usize) -> impl Iterator<Item = Coord> {
    pass_points(dimension, Color::Even).chain(pass_points(dimension, Color::Odd))
}
