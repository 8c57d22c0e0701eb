use crate::{
    sync::{AtomicBool, AtomicUsize, Ordering},
    types::{Coord, SyncUnsafeCell},
};
use core::fmt;
use thiserror::Error;

/// Smallest dimension with at least one interior cell.
pub const MIN_DIMENSION: usize = 3;

/// Error kind for grids that cannot be built.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum GridError {
    /// The requested dimension leaves no interior cell.
    #[error("grid dimension must be at least {MIN_DIMENSION}, got {0}")]
    DimensionTooSmall(usize),
    /// A row of the input does not have as many values as there are rows.
    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRows {
        /// Offending row.
        row: usize,
        /// Number of rows, i.e. the expected row length.
        expected: usize,
        /// Actual row length.
        found: usize,
    },
}

/// Square `dimension x dimension` grid of values, stored row-major.
///
/// Cells in row or column `0` or `dimension - 1` are boundary cells and are
/// never written by the solver. Everything else is interior.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    dimension: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Create a zero-initialized grid.
    ///
    /// # Errors
    /// If `dimension` is smaller than [`MIN_DIMENSION`].
    pub fn new(dimension: usize) -> Result<Self, GridError> {
        if dimension < MIN_DIMENSION {
            return Err(GridError::DimensionTooSmall(dimension));
        }
        Ok(Self {
            dimension,
            data: vec![0.0; dimension * dimension],
        })
    }

    /// Create a grid from its rows.
    ///
    /// # Errors
    /// If there are fewer than [`MIN_DIMENSION`] rows or the input is not
    /// square.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, GridError> {
        let dimension = rows.len();
        let mut grid = Self::new(dimension)?;
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != dimension {
                return Err(GridError::RaggedRows {
                    row,
                    expected: dimension,
                    found: values.len(),
                });
            }
            grid.data[row * dimension..(row + 1) * dimension].copy_from_slice(values);
        }
        Ok(grid)
    }

    /// Number of rows (and columns).
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Value at `(row, col)`.
    ///
    /// # Panics
    /// If the coordinate is outside the grid.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[self.offset(row, col)]
    }

    /// Overwrite the value at `(row, col)`.
    ///
    /// # Panics
    /// If the coordinate is outside the grid.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.offset(row, col);
        self.data[idx] = value;
    }

    /// Whether `(row, col)` lies on the fixed outer ring.
    #[must_use]
    pub const fn is_boundary(&self, row: usize, col: usize) -> bool {
        is_boundary(self.dimension, row, col)
    }

    /// Iterate over rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.dimension)
    }

    /// All values in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// First cell holding NaN or an infinity, if any.
    #[must_use]
    pub fn first_non_finite(&self) -> Option<Coord> {
        self.data
            .iter()
            .position(|value| !value.is_finite())
            .map(|idx| Coord::new(idx / self.dimension, idx % self.dimension))
    }

    /// Hand out a view through which disjoint cells may be written from
    /// several threads while `self` stays exclusively borrowed.
    pub(crate) fn share(&mut self) -> SharedGrid<'_> {
        let len = self.data.len();
        let ptr = self.data.as_mut_ptr().cast::<SyncUnsafeCell<f64>>();
        // SAFETY: `SyncUnsafeCell<f64>` is `repr(transparent)` over `UnsafeCell<f64>`,
        // which has the same in-memory representation as `f64`. The exclusive borrow
        // of `self.data` lasts as long as the returned view, so nothing else can
        // observe the buffer meanwhile.
        let cells = unsafe { core::slice::from_raw_parts(ptr, len) };
        SharedGrid {
            cells,
            dimension: self.dimension,
        }
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.dimension && col < self.dimension,
            "({row}, {col}) is outside a {0}x{0} grid",
            self.dimension
        );
        Coord::new(row, col).index(self.dimension)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for value in row {
                write!(f, "{value:10.6} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[inline]
pub(crate) const fn is_boundary(dimension: usize, row: usize, col: usize) -> bool {
    row == 0 || col == 0 || row == dimension - 1 || col == dimension - 1
}

/// Lock-free view over the value buffer of an exclusively borrowed [`Grid`].
///
/// Only [`crate::task`] dereferences cells, through leases that guarantee a
/// single writer per cell and no reader of that cell during the same pass.
#[derive(Debug, Copy, Clone)]
pub(crate) struct SharedGrid<'g> {
    cells: &'g [SyncUnsafeCell<f64>],
    dimension: usize,
}

impl SharedGrid<'_> {
    pub(crate) const fn dimension(&self) -> usize {
        self.dimension
    }

    /// # Safety
    ///
    /// No thread may be writing `coord` concurrently with this call.
    #[inline]
    pub(crate) unsafe fn read(&self, coord: Coord) -> f64 {
        let cell = &self.cells[coord.index(self.dimension)];
        // SAFETY: The caller guarantees there is no concurrent writer of this cell.
        unsafe { *cell.get() }
    }

    /// # Safety
    ///
    /// The caller must be the only thread accessing `coord` until the write
    /// is published by a release operation.
    #[inline]
    pub(crate) unsafe fn write(&self, coord: Coord, value: f64) {
        let cell = &self.cells[coord.index(self.dimension)];
        // SAFETY: The caller guarantees exclusive access to this cell.
        unsafe { *cell.get() = value };
    }
}

/// Per-cell "solved" markers, private to a single solve.
///
/// Boundary cells are always solved. An interior cell is solved once its last
/// recomputation moved it by less than the precision. Flags of a pass that
/// modified any value are wiped by [`SolvedFlags::reset`] at the following
/// barrier.
#[derive(Debug)]
pub(crate) struct SolvedFlags {
    dimension: usize,
    flags: Box<[AtomicBool]>,
    /// Number of interior cells currently not solved.
    unsolved: AtomicUsize,
}

impl SolvedFlags {
    pub(crate) fn new(dimension: usize) -> Self {
        let flags = (0..dimension * dimension)
            .map(|_| AtomicBool::new(false))
            .collect();
        let result = Self {
            dimension,
            flags,
            unsolved: AtomicUsize::new(0),
        };
        result.reset();
        result
    }

    /// Restore the boundary-true, interior-false pattern.
    ///
    /// Must only be called while no update task is running.
    pub(crate) fn reset(&self) {
        let dimension = self.dimension;
        for (idx, flag) in self.flags.iter().enumerate() {
            flag.store(
                is_boundary(dimension, idx / dimension, idx % dimension),
                Ordering::Relaxed,
            );
        }
        let interior = (dimension - 2) * (dimension - 2);
        self.unsolved.store(interior, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn is_solved(&self, coord: Coord) -> bool {
        self.flags[coord.index(self.dimension)].load(Ordering::Relaxed)
    }

    /// Flag `coord` as solved.
    ///
    /// Visibility to the orchestrator rides on the slot release that ends
    /// every task.
    pub(crate) fn mark_solved(&self, coord: Coord) {
        let was_solved = self.flags[coord.index(self.dimension)].swap(true, Ordering::Relaxed);
        if !was_solved {
            self.unsolved.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Whether no `false` flag remains.
    pub(crate) fn all_solved(&self) -> bool {
        self.unsolved.load(Ordering::Relaxed) == 0
    }
}
