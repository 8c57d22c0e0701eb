use crate::{
    executor::{CancellationToken, SolveReport, SolveStatus, SolverSetupError},
    grid::{SharedGrid, SolvedFlags},
    sequencer::Cursor,
    slots::SlotPool,
    sync::{AtomicBool, Ordering},
    task::{CellLease, PassLeases, Quiescent, SlotRelease, TaskOutcome, UpdateTask},
    types::{Coord, SlotId},
};
use log::{debug, info, trace};
use std::{
    io,
    thread::{self, Scope, ScopedJoinHandle},
};
use thiserror::Error;

/// Error kind for failed solves.
///
/// No failure is retried: the first one aborts the solve after every
/// outstanding task has been joined.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SolveError {
    /// The grid was rejected before relaxation started.
    #[error(transparent)]
    Setup(#[from] SolverSetupError),
    /// The operating system refused to start a worker thread.
    #[error("failed to start update task for {coord} in slot {slot}")]
    TaskSpawn {
        /// Slot the task was admitted into.
        slot: SlotId,
        /// Cell the task was meant to update.
        coord: Coord,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// An update task panicked.
    #[error("update task for {coord} in slot {slot} panicked")]
    TaskPanicked {
        /// Slot the task occupied.
        slot: SlotId,
        /// Cell the task was updating.
        coord: Coord,
    },
}

/// Orchestrator states.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// Emitting points of the current colour and admitting tasks.
    Sweeping,
    /// Waiting for every task of the finished pass before flipping colour.
    Barrier,
    /// Terminal: the grid holds the relaxed solution.
    Converged,
    /// Terminal: stopped on request.
    Cancelled,
}

/// Worker threads of one solve, indexed by the slot they occupy.
struct Workers<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    pool: &'env SlotPool,
    flags: &'env SolvedFlags,
    pass_dirty: &'env AtomicBool,
    precision: f64,
    handles: Vec<Option<(Coord, ScopedJoinHandle<'scope, TaskOutcome>)>>,
    passes: usize,
    tasks_spawned: usize,
    modified: usize,
    #[cfg(all(test, not(feature = "loom")))]
    trace: Option<&'env tests::TaskTrace>,
}

impl<'scope, 'env> Workers<'scope, 'env> {
    fn new(
        scope: &'scope Scope<'scope, 'env>,
        pool: &'env SlotPool,
        flags: &'env SolvedFlags,
        pass_dirty: &'env AtomicBool,
        precision: f64,
    ) -> Self {
        Self {
            scope,
            pool,
            flags,
            pass_dirty,
            precision,
            handles: (0..pool.capacity()).map(|_| None).collect(),
            passes: 0,
            tasks_spawned: 0,
            modified: 0,
            #[cfg(all(test, not(feature = "loom")))]
            trace: None,
        }
    }

    /// Wait for a free slot and start a task for the leased cell in it.
    fn admit<'g: 'scope>(&mut self, lease: CellLease<'g>) -> Result<(), SolveError> {
        let coord = lease.coord();
        let slot = self.pool.acquire();
        // The previous occupant has released the slot, so this join is immediate.
        if let Err(err) = self.reap(slot) {
            self.pool.release(slot);
            return Err(err);
        }
        let task = UpdateTask {
            lease,
            precision: self.precision,
            flags: self.flags,
            pass_dirty: self.pass_dirty,
            slot: SlotRelease::new(self.pool, slot),
        };
        #[cfg(all(test, not(feature = "loom")))]
        let traced = self.trace.map(|trace| (trace, self.passes));
        // On failure the closure is dropped, and with it the slot release.
        let handle = thread::Builder::new()
            .name(format!("cbr-slot-{slot}"))
            .spawn_scoped(self.scope, move || {
                #[cfg(all(test, not(feature = "loom")))]
                let _span = traced.map(|(trace, pass)| trace.enter(pass, coord));
                task.exec()
            })
            .map_err(|source| SolveError::TaskSpawn { slot, coord, source })?;
        trace!("admitted {coord} into slot {slot}");
        self.handles[slot.index()] = Some((coord, handle));
        self.tasks_spawned += 1;
        Ok(())
    }

    fn reap(&mut self, slot: SlotId) -> Result<(), SolveError> {
        let Some((coord, handle)) = self.handles[slot.index()].take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(TaskOutcome::Modified) => self.modified += 1,
            Ok(TaskOutcome::Solved) => {}
            Err(_) => return Err(SolveError::TaskPanicked { slot, coord }),
        }
        Ok(())
    }

    /// Join every outstanding task. All of them are joined even if one
    /// panicked; the first failure is reported.
    fn join_all(&mut self) -> Result<Quiescent, SolveError> {
        let mut first_error = None;
        for idx in 0..self.handles.len() {
            if let Err(err) = self.reap(SlotId(idx)) {
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        debug_assert!(self.pool.all_free(), "Workers::join_all: slot left busy");
        // SAFETY: Every task handle has been joined and no new task is admitted
        // while the returned proof is in use.
        Ok(unsafe { Quiescent::assume() })
    }
}

pub(super) fn run(
    grid: SharedGrid<'_>,
    flags: &SolvedFlags,
    pool: &SlotPool,
    precision: f64,
    cancel: &CancellationToken,
) -> Result<SolveReport, SolveError> {
    let pass_dirty = AtomicBool::new(false);
    thread::scope(|scope| {
        let mut workers = Workers::new(scope, pool, flags, &pass_dirty, precision);
        drive(grid, &mut workers, cancel)
    })
}

fn drive<'scope, 'env, 'g: 'scope>(
    grid: SharedGrid<'g>,
    workers: &mut Workers<'scope, 'env>,
    cancel: &CancellationToken,
) -> Result<SolveReport, SolveError> {
    let result = sweep_until_done(grid, workers, cancel);
    if result.is_err() {
        // Leave no unjoined thread behind for the scope to trip over.
        let _ = workers.join_all();
    }
    result
}

fn sweep_until_done<'scope, 'env, 'g: 'scope>(
    grid: SharedGrid<'g>,
    workers: &mut Workers<'scope, 'env>,
    cancel: &CancellationToken,
) -> Result<SolveReport, SolveError> {
    let pool = workers.pool;
    let flags = workers.flags;
    let mut cursor = Cursor::new(grid.dimension());
    // SAFETY: Nothing has been admitted yet.
    let mut leases = PassLeases::new(grid, cursor.color(), unsafe { Quiescent::assume() });
    let mut state = State::Sweeping;
    let mut pass_first_task = 0usize;

    loop {
        state = match state {
            State::Sweeping => {
                // Slots first: a task still running could flip flags after the
                // solved check passed.
                if cancel.is_cancelled() {
                    State::Cancelled
                } else if pool.all_free() && flags.all_solved() {
                    State::Converged
                } else if let Some(coord) = cursor.current() {
                    // Solved points are skipped before a slot is taken.
                    if !flags.is_solved(coord) {
                        workers.admit(leases.lease(coord))?;
                    }
                    if cursor.is_last_of_pass() {
                        State::Barrier
                    } else {
                        cursor.advance();
                        State::Sweeping
                    }
                } else {
                    State::Barrier
                }
            }
            State::Barrier => {
                let quiescent = workers.join_all()?;
                workers.passes += 1;
                let dirty = workers.pass_dirty.swap(false, Ordering::Relaxed);
                if dirty {
                    flags.reset();
                }
                debug!(
                    "pass {} ({}): {} tasks, {} modified",
                    workers.passes,
                    cursor.color(),
                    workers.tasks_spawned - pass_first_task,
                    workers.modified,
                );
                pass_first_task = workers.tasks_spawned;
                workers.modified = 0;
                if flags.all_solved() {
                    State::Converged
                } else {
                    cursor.next_pass();
                    leases = PassLeases::new(grid, cursor.color(), quiescent);
                    State::Sweeping
                }
            }
            State::Converged => {
                workers.join_all()?;
                info!(
                    "converged after {} passes, {} tasks",
                    workers.passes,
                    workers.tasks_spawned
                );
                return Ok(SolveReport {
                    status: SolveStatus::Converged,
                    passes: workers.passes,
                    tasks_spawned: workers.tasks_spawned,
                });
            }
            State::Cancelled => {
                workers.join_all()?;
                info!(
                    "cancelled after {} passes, {} tasks",
                    workers.passes,
                    workers.tasks_spawned
                );
                return Ok(SolveReport {
                    status: SolveStatus::Cancelled,
                    passes: workers.passes,
                    tasks_spawned: workers.tasks_spawned,
                });
            }
        };
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::{config::Admission, grid::Grid};
    use core::{num::NonZeroUsize, time::Duration};
    use std::sync::{Mutex, atomic::AtomicUsize};

    /// Lifetime of one task in ticks of the trace clock.
    #[derive(Debug, Copy, Clone)]
    struct Span {
        pass: usize,
        coord: Coord,
        start: usize,
        end: usize,
    }

    /// Records when every task runs. Can stretch tasks or make one of them
    /// panic.
    #[derive(Debug, Default)]
    pub(super) struct TaskTrace {
        clock: AtomicUsize,
        spans: Mutex<Vec<Span>>,
        hold: Duration,
        panic_at: Option<Coord>,
    }

    pub(super) struct OpenSpan<'t> {
        trace: &'t TaskTrace,
        pass: usize,
        coord: Coord,
        start: usize,
    }

    impl TaskTrace {
        pub(super) fn enter(&self, pass: usize, coord: Coord) -> OpenSpan<'_> {
            let start = self.clock.fetch_add(1, Ordering::SeqCst);
            if self.panic_at == Some(coord) {
                panic!("update of {coord} failed");
            }
            thread::sleep(self.hold);
            OpenSpan {
                trace: self,
                pass,
                coord,
                start,
            }
        }
    }

    impl Drop for OpenSpan<'_> {
        fn drop(&mut self) {
            let end = self.trace.clock.fetch_add(1, Ordering::SeqCst);
            self.trace.spans.lock().unwrap().push(Span {
                pass: self.pass,
                coord: self.coord,
                start: self.start,
                end,
            });
        }
    }

    fn hot_top_grid(dimension: usize) -> Grid {
        let mut grid = Grid::new(dimension).unwrap();
        for col in 0..dimension {
            grid.set(0, col, 100.0);
        }
        grid
    }

    /// Solve with tracing enabled. Also reports whether every slot was free
    /// afterwards.
    fn solve_traced(
        grid: &mut Grid,
        threads: usize,
        admission: Admission,
        precision: f64,
        trace: &TaskTrace,
    ) -> (Result<SolveReport, SolveError>, bool) {
        let flags = SolvedFlags::new(grid.dimension());
        let pool = SlotPool::new(NonZeroUsize::new(threads).unwrap(), admission);
        let pass_dirty = AtomicBool::new(false);
        let cancel = CancellationToken::new();
        let result = thread::scope(|scope| {
            let mut workers = Workers::new(scope, &pool, &flags, &pass_dirty, precision);
            workers.trace = Some(trace);
            drive(grid.share(), &mut workers, &cancel)
        });
        (result, pool.all_free())
    }

    fn max_concurrency(spans: &[Span]) -> usize {
        let mut events: Vec<(usize, bool)> = spans
            .iter()
            .flat_map(|span| [(span.start, true), (span.end, false)])
            .collect();
        events.sort_unstable();
        let mut running = 0usize;
        let mut max = 0;
        for (_, is_start) in events {
            if is_start {
                running += 1;
                max = max.max(running);
            } else {
                running -= 1;
            }
        }
        max
    }

    #[test]
    fn passes_never_overlap_and_concurrent_cells_are_apart() {
        for admission in [Admission::Spin, Admission::Block] {
            for threads in [2, 4] {
                let trace = TaskTrace {
                    hold: Duration::from_micros(300),
                    ..TaskTrace::default()
                };
                let mut grid = hot_top_grid(7);
                let (result, all_free) = solve_traced(&mut grid, threads, admission, 1.0, &trace);
                let report = result.unwrap();
                assert_eq!(report.status, SolveStatus::Converged);
                assert!(all_free);

                let spans = trace.spans.into_inner().unwrap();
                assert_eq!(spans.len(), report.tasks_spawned);
                for (i, a) in spans.iter().enumerate() {
                    for (j, b) in spans.iter().enumerate() {
                        if a.pass < b.pass {
                            assert!(a.end < b.start, "{a:?} still running when {b:?} started");
                        }
                        if i == j || a.pass != b.pass {
                            continue;
                        }
                        assert_ne!(a.coord, b.coord, "cell updated twice in one pass");
                        let overlap = a.start < b.end && b.start < a.end;
                        let distance = a.coord.row.abs_diff(b.coord.row)
                            + a.coord.col.abs_diff(b.coord.col);
                        assert!(
                            !overlap || distance > 1,
                            "neighbours {a:?} and {b:?} ran concurrently"
                        );
                    }
                }

                let max = max_concurrency(&spans);
                assert!(max <= threads, "{max} tasks in flight with {threads} slots");
                assert!(max > 1, "tasks never overlapped with {threads} slots");
            }
        }
    }

    #[test]
    fn panicking_occupant_is_reported_and_its_slot_freed() {
        for threads in [1, 3] {
            let trace = TaskTrace {
                panic_at: Some(Coord::new(1, 1)),
                ..TaskTrace::default()
            };
            let mut grid = hot_top_grid(5);
            let (result, all_free) =
                solve_traced(&mut grid, threads, Admission::Block, 1e-3, &trace);
            assert!(
                matches!(
                    result,
                    Err(SolveError::TaskPanicked { coord, .. }) if coord == Coord::new(1, 1)
                ),
                "{result:?}"
            );
            assert!(all_free, "slot leaked with {threads} slots");
        }
    }
}
