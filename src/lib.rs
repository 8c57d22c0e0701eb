//! Red/black relaxation of a steady-state diffusion grid with bounded,
//! per-point task admission.
//!
//! This crate solves the discrete Laplace equation on a square grid by
//! repeatedly replacing every interior cell with the mean of its four
//! neighbours until no cell moves by more than a precision threshold. It:
//! - Partitions interior cells into two colours by the parity of
//!   `row + col`. Same-coloured cells never neighbour each other, so all cells
//!   of one colour may be recomputed concurrently.
//! - Spawns one short-lived worker thread per admitted point and bounds the
//!   number of workers in flight with a fixed table of admission slots.
//! - Separates colour passes with a barrier, so no worker of pass `k + 1` runs
//!   while a worker of pass `k` may still write.
//! - Detects convergence once a whole two-colour sweep completes with every
//!   cell flagged solved and every slot free.
//!
//! Key modules:
//! - `config`: validated solver configuration (`SolveConfig`, `Admission`).
//! - `grid`: the caller-owned value grid and the solver's per-cell flags.
//! - `sequencer`: the deterministic red/black traversal order.
//! - `slots`: the admission slot pool bounding concurrently running tasks.
//! - `executor`: solve-state setup and the sweep/barrier loop.
//! - `problem`: the built-in problem catalogue used by the binary.
//!
//! Quick start:
//! 1. Build a `Grid` (directly, or via `problem::load`).
//! 2. Build a `SolveConfig` with a thread budget and a precision.
//! 3. Call `executor::solve` (or `Solver::setup` + `Solver::execute` when a
//!    `CancellationToken` is needed) and inspect the returned `SolveReport`.
//!
//! Grid cells are shared between workers without a lock. Each worker receives
//! an exclusive lease on its own cell, issued once per pass by a single
//! arbiter that checks the colour partition, and only reads neighbours of the
//! opposite colour which are never written during that pass.

/// Validated solver configuration.
///
/// Exposes `SolveConfig` (thread budget, precision, admission policy) and the
/// `ConfigError` returned when a budget or a precision is rejected before any
/// scheduling starts.
pub mod config;
/// The relaxation orchestrator.
///
/// Contains solve-state setup (grid validation, flag and slot allocation) and
/// the sweep loop that admits update tasks, enforces pass barriers and detects
/// convergence or cancellation.
pub mod executor;
/// Grid storage: the caller-owned value grid, its text rendering, and the
/// solver-private solved flags and shared cell view.
pub mod grid;
/// Built-in problem catalogue: dimensions and boundary/initial values for
/// problems identified by number.
pub mod problem;
/// Red/black traversal order over the interior cells of a grid.
pub mod sequencer;
/// Fixed-size admission slot pool bounding the number of in-flight tasks.
pub mod slots;
mod sync;
mod task;
/// Core types shared across the crate (coordinates, slot ids, cell wrapper).
///
/// Provides `Coord`, `SlotId`, the `IndexMap` alias with a fast hasher, and a
/// `SyncUnsafeCell` wrapper enabling interior mutability under the solver's
/// scheduling guarantees.
pub mod types;
mod utils;

pub use config::{Admission, ConfigError, SolveConfig};
pub use executor::{CancellationToken, SolveError, SolveReport, SolveStatus, Solver, solve};
pub use grid::{Grid, GridError};
