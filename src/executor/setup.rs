use crate::{grid::Grid, types::Coord};
use thiserror::Error;

/// Error kind for solver setup failures.
///
/// Currently indicates that the grid holds a value that relaxation could
/// never settle.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolverSetupError {
    /// The grid holds NaN or an infinity.
    #[error("grid value at {0} is not finite")]
    NonFinite(Coord),
}

pub(super) fn check_grid(grid: &Grid) -> Result<(), SolverSetupError> {
    match grid.first_non_finite() {
        Some(coord) => Err(SolverSetupError::NonFinite(coord)),
        None => Ok(()),
    }
}
