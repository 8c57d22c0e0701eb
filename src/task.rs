use crate::{
    grid::{SharedGrid, SolvedFlags, is_boundary},
    sequencer::Color,
    slots::SlotPool,
    sync::{AtomicBool, Ordering},
    types::{Coord, SlotId},
};

/// Proof that no update task is running. Only the orchestrator's barrier (and
/// solve start) can produce one.
#[derive(Debug)]
pub(crate) struct Quiescent(());

impl Quiescent {
    /// # Safety
    ///
    /// Every task ever admitted on the grid in question must have completed.
    pub(crate) const unsafe fn assume() -> Self {
        Self(())
    }
}

/// Single arbiter handing out exclusive cell leases for one colour pass.
///
/// Leases are only issued for interior cells of the pass colour, and only in
/// strictly increasing row-major order, so no cell is ever leased twice within
/// a pass. Together with the colour check this makes every leased cell
/// disjoint from every other leased cell and from all of their neighbours.
#[derive(Debug)]
pub(crate) struct PassLeases<'g> {
    grid: SharedGrid<'g>,
    color: Color,
    last_issued: Option<usize>,
}

impl<'g> PassLeases<'g> {
    pub(crate) fn new(grid: SharedGrid<'g>, color: Color, _quiescent: Quiescent) -> Self {
        Self {
            grid,
            color,
            last_issued: None,
        }
    }

    pub(crate) fn lease(&mut self, coord: Coord) -> CellLease<'g> {
        let dimension = self.grid.dimension();
        assert!(
            coord.row < dimension
                && coord.col < dimension
                && !is_boundary(dimension, coord.row, coord.col),
            "PassLeases::lease: {coord} is not an interior cell"
        );
        assert_eq!(
            Color::of(coord),
            self.color,
            "PassLeases::lease: {coord} does not belong to the {} pass",
            self.color
        );
        let index = coord.index(dimension);
        assert!(
            self.last_issued.is_none_or(|last| last < index),
            "PassLeases::lease: {coord} leased out of order"
        );
        self.last_issued = Some(index);
        CellLease {
            grid: self.grid,
            coord,
        }
    }
}

/// Exclusive write access to one interior cell for the duration of a pass,
/// plus read access to its four neighbours.
#[derive(Debug)]
pub(crate) struct CellLease<'g> {
    grid: SharedGrid<'g>,
    coord: Coord,
}

impl CellLease<'_> {
    pub(crate) const fn coord(&self) -> Coord {
        self.coord
    }

    pub(crate) fn current(&self) -> f64 {
        // SAFETY: This lease is the only writer of `coord` during the pass, and the
        // lease is not shared between threads.
        unsafe { self.grid.read(self.coord) }
    }

    /// Mean of the four direct neighbours.
    pub(crate) fn neighbour_mean(&self) -> f64 {
        let Coord { row, col } = self.coord;
        // SAFETY: Neighbours have the opposite colour. No lease is issued for them
        // during this pass, and every writer of a previous pass has finished.
        unsafe {
            (self.grid.read(Coord::new(row, col - 1))
                + self.grid.read(Coord::new(row, col + 1))
                + self.grid.read(Coord::new(row - 1, col))
                + self.grid.read(Coord::new(row + 1, col)))
                / 4.0
        }
    }

    pub(crate) fn store(&mut self, value: f64) {
        // SAFETY: This lease grants exclusive access to `coord`; the write is
        // published by the slot release that ends the task.
        unsafe { self.grid.write(self.coord, value) };
    }
}

/// Frees the slot when dropped, so a panicking task still releases it.
#[derive(Debug)]
pub(crate) struct SlotRelease<'p> {
    pool: &'p SlotPool,
    slot: SlotId,
}

impl<'p> SlotRelease<'p> {
    pub(crate) const fn new(pool: &'p SlotPool, slot: SlotId) -> Self {
        Self { pool, slot }
    }
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}

/// What a finished task did to its cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    /// The cell moved by less than the precision and is now flagged solved.
    Solved,
    /// The cell took a new value and the pass is marked dirty.
    Modified,
}

/// Unit of work: recompute one cell from its four neighbours.
#[derive(Debug)]
pub(crate) struct UpdateTask<'g, 'p> {
    pub(crate) lease: CellLease<'g>,
    pub(crate) precision: f64,
    pub(crate) flags: &'p SolvedFlags,
    pub(crate) pass_dirty: &'p AtomicBool,
    pub(crate) slot: SlotRelease<'p>,
}

impl UpdateTask<'_, '_> {
    pub(crate) fn exec(self) -> TaskOutcome {
        let Self {
            mut lease,
            precision,
            flags,
            pass_dirty,
            slot,
        } = self;
        let new_value = lease.neighbour_mean();
        let outcome = if (new_value - lease.current()).abs() < precision {
            flags.mark_solved(lease.coord());
            TaskOutcome::Solved
        } else {
            lease.store(new_value);
            pass_dirty.store(true, Ordering::Relaxed);
            TaskOutcome::Modified
        };
        drop(slot);
        outcome
    }
}
