use core::cell::UnsafeCell;
use derive_more::{Deref, DerefMut, Display};
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;

/// A minimal `UnsafeCell` wrapper that is `Sync` when `T: Sync`.
///
/// Used internally by the solver to let worker threads write grid cells
/// concurrently while correctness is ensured by scheduling (every cell has at
/// most one writer per pass, and nobody reads it during that pass).
#[derive(Debug, Deref, DerefMut)]
#[repr(transparent)]
pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<T>);

unsafe impl<T: Sync> Sync for SyncUnsafeCell<T> {}

/// Position of a cell in a square grid.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("({row}, {col})")]
pub struct Coord {
    /// Row index, `0` is the top boundary row.
    pub row: usize,
    /// Column index, `0` is the left boundary column.
    pub col: usize,
}

impl Coord {
    /// Build a coordinate from a row and a column.
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row-major offset of this coordinate in a grid of the given dimension.
    #[inline]
    #[must_use]
    pub const fn index(self, dimension: usize) -> usize {
        self.row * dimension + self.col
    }
}

/// Identity of an admission slot, in `0..capacity`.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    /// Position of the slot in its pool.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
