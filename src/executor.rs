mod execute;
mod setup;

/// Error returned by `Solver::execute` when a task cannot be started or
/// aborts.
pub use crate::executor::execute::SolveError;
/// Error returned by `Solver::setup` when the input grid cannot be relaxed.
pub use crate::executor::setup::SolverSetupError;
use crate::{
    config::SolveConfig,
    grid::{Grid, SolvedFlags},
    slots::SlotPool,
};
use derive_more::Debug;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Red/black relaxation orchestrator bound to one grid.
///
/// Key responsibilities:
/// - Validates the grid and allocates the per-cell solved flags and the slot
///   pool during `setup`.
/// - Walks the red/black order, admitting one update task per unsolved point
///   into a free slot, with at most `threads` tasks in flight.
/// - Joins every outstanding task at the end of each colour pass before the
///   colour flips.
/// - Stops once all slots are free and every cell is flagged solved, or when
///   cancelled.
#[must_use]
#[derive(Debug)]
pub struct Solver<'g> {
    #[debug(skip)]
    grid: &'g mut Grid,
    flags: SolvedFlags,
    pool: SlotPool,
    precision: f64,
}

/// How a solve ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// A full two-colour sweep completed without modifying any cell.
    Converged,
    /// The cancellation token fired. The grid holds a consistent partial
    /// relaxation: every admitted task has finished.
    Cancelled,
}

/// Summary of a finished solve.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SolveReport {
    /// How the solve ended.
    pub status: SolveStatus,
    /// Number of completed colour passes.
    pub passes: usize,
    /// Number of update tasks admitted over the whole solve.
    pub tasks_spawned: usize,
}

/// Cloneable flag used to stop a running solve from another thread.
///
/// The orchestrator checks it once per cursor advance.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every solve observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl<'g> Solver<'g> {
    /// Prepare a solve of `grid` by:
    /// - Rejecting grids holding NaN or infinite values, which could never
    ///   settle,
    /// - Allocating solved flags with the boundary-true, interior-false
    ///   pattern,
    /// - Allocating `config.threads()` free admission slots.
    ///
    /// # Errors
    /// If the grid holds a non-finite value.
    pub fn setup(grid: &'g mut Grid, config: &SolveConfig) -> Result<Self, SolverSetupError> {
        setup::check_grid(grid)?;
        let flags = SolvedFlags::new(grid.dimension());
        let pool = SlotPool::new(config.threads(), config.admission());
        Ok(Self {
            grid,
            flags,
            pool,
            precision: config.precision(),
        })
    }

    /// Relax the grid in place until convergence or cancellation.
    ///
    /// Each admitted task recomputes one cell as the mean of its four
    /// neighbours on its own thread. Tasks of one colour pass run concurrently
    /// and never overlap with tasks of another pass.
    ///
    /// # Errors
    /// If a worker thread cannot be spawned, or a task panics. Every task
    /// already admitted is joined before the error is returned.
    pub fn execute(self, cancel: &CancellationToken) -> Result<SolveReport, SolveError> {
        let Self {
            grid,
            flags,
            pool,
            precision,
        } = self;
        execute::run(grid.share(), &flags, &pool, precision, cancel)
    }
}

/// Relax `grid` in place with the given configuration, without cancellation.
///
/// # Errors
/// See [`Solver::setup`] and [`Solver::execute`].
pub fn solve(grid: &mut Grid, config: &SolveConfig) -> Result<SolveReport, SolveError> {
    Solver::setup(grid, config)?.execute(&CancellationToken::new())
}
