use crate::{
    grid::{Grid, GridError},
    types::IndexMap,
};
use rustc_hash::FxBuildHasher;
use std::sync::LazyLock;
use thiserror::Error;

/// Error kind for problem lookups.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProblemError {
    /// No built-in problem has this id.
    #[error("invalid problem id {0}, expected one of {ids}", ids = known_ids())]
    UnknownProblem(i64),
    /// The grid to populate does not have the problem's dimension.
    #[error("problem {id} needs a {expected}x{expected} grid, got {found}x{found}")]
    DimensionMismatch {
        /// Problem id.
        id: i64,
        /// Dimension of the problem.
        expected: usize,
        /// Dimension of the grid given.
        found: usize,
    },
    /// The problem's grid could not be allocated.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Values along one edge of the grid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Edge {
    /// The same value everywhere along the edge.
    Constant(f64),
    /// Linear interpolation from `from` (row/column 0) to `to` (the last
    /// row/column).
    Ramp {
        /// Value at index 0.
        from: f64,
        /// Value at the last index.
        to: f64,
    },
}

impl Edge {
    fn value_at(self, idx: usize, dimension: usize) -> f64 {
        match self {
            Self::Constant(value) => value,
            Self::Ramp { from, to } => {
                let t = idx as f64 / (dimension - 1) as f64;
                from + (to - from) * t
            }
        }
    }
}

/// A named relaxation problem: dimension, boundary values and interior seed.
///
/// Top and bottom edges own the corner cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Short human-readable description.
    pub name: &'static str,
    /// Grid dimension.
    pub dimension: usize,
    /// Row 0.
    pub top: Edge,
    /// Last row.
    pub bottom: Edge,
    /// Column 0.
    pub left: Edge,
    /// Last column.
    pub right: Edge,
    /// Initial value of every interior cell.
    pub interior: f64,
}

impl Problem {
    /// Write this problem's initial values into `grid`.
    fn fill(&self, grid: &mut Grid) {
        let dimension = self.dimension;
        let last = dimension - 1;
        for row in 0..dimension {
            for col in 0..dimension {
                let value = if row == 0 {
                    self.top.value_at(col, dimension)
                } else if row == last {
                    self.bottom.value_at(col, dimension)
                } else if col == 0 {
                    self.left.value_at(row, dimension)
                } else if col == last {
                    self.right.value_at(row, dimension)
                } else {
                    self.interior
                };
                grid.set(row, col, value);
            }
        }
    }
}

static CATALOGUE: LazyLock<IndexMap<i64, Problem>> = LazyLock::new(|| {
    use Edge::{Constant, Ramp};
    let problems = [
        Problem {
            name: "4x4, hot top edge",
            dimension: 4,
            top: Constant(10.0),
            bottom: Constant(0.0),
            left: Constant(0.0),
            right: Constant(0.0),
            interior: 0.0,
        },
        Problem {
            name: "5x5, very hot top edge",
            dimension: 5,
            top: Constant(100.0),
            bottom: Constant(0.0),
            left: Constant(0.0),
            right: Constant(0.0),
            interior: 0.0,
        },
        Problem {
            name: "6x6, left-to-right gradient",
            dimension: 6,
            top: Ramp { from: 1.0, to: 0.0 },
            bottom: Ramp { from: 1.0, to: 0.0 },
            left: Constant(1.0),
            right: Constant(0.0),
            interior: 0.0,
        },
        Problem {
            name: "10x10, uniform edges",
            dimension: 10,
            top: Constant(50.0),
            bottom: Constant(50.0),
            left: Constant(50.0),
            right: Constant(50.0),
            interior: 0.0,
        },
        Problem {
            name: "20x20, mixed edges",
            dimension: 20,
            top: Constant(100.0),
            bottom: Constant(25.0),
            left: Constant(50.0),
            right: Constant(75.0),
            interior: 0.0,
        },
    ];
    let mut catalogue = IndexMap::with_capacity_and_hasher(problems.len(), FxBuildHasher);
    for (id, problem) in (1..).zip(problems) {
        catalogue.insert(id, problem);
    }
    catalogue
});

fn known_ids() -> String {
    let ids: Vec<_> = CATALOGUE.keys().map(i64::to_string).collect();
    ids.join(", ")
}

/// Every built-in problem, by id, in ascending id order.
pub fn catalogue() -> impl Iterator<Item = (i64, &'static Problem)> {
    CATALOGUE.iter().map(|(&id, problem)| (id, problem))
}

/// Look up a built-in problem.
///
/// # Errors
/// If no problem has this id.
pub fn get(id: i64) -> Result<&'static Problem, ProblemError> {
    CATALOGUE.get(&id).ok_or(ProblemError::UnknownProblem(id))
}

/// Grid dimension of problem `id`.
///
/// # Errors
/// If no problem has this id.
pub fn dimension(id: i64) -> Result<usize, ProblemError> {
    get(id).map(|problem| problem.dimension)
}

/// Fill `grid` with the boundary and initial values of problem `id`.
///
/// The grid is left untouched on error.
///
/// # Errors
/// If no problem has this id or `grid` has the wrong dimension.
pub fn populate(grid: &mut Grid, id: i64) -> Result<(), ProblemError> {
    let problem = get(id)?;
    if grid.dimension() != problem.dimension {
        return Err(ProblemError::DimensionMismatch {
            id,
            expected: problem.dimension,
            found: grid.dimension(),
        });
    }
    problem.fill(grid);
    Ok(())
}

/// Allocate and populate the grid of problem `id`.
///
/// # Errors
/// If no problem has this id.
pub fn load(id: i64) -> Result<Grid, ProblemError> {
    let mut grid = Grid::new(dimension(id)?)?;
    populate(&mut grid, id)?;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_one_through_five() {
        let ids: Vec<_> = catalogue().map(|(id, _)| id).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_unknown_ids() {
        for id in [0, -1, 6, i64::MIN] {
            assert_eq!(dimension(id), Err(ProblemError::UnknownProblem(id)));
        }
        let mut grid = Grid::new(4).unwrap();
        grid.set(1, 1, 7.0);
        let before = grid.clone();
        assert_eq!(
            populate(&mut grid, 0),
            Err(ProblemError::UnknownProblem(0))
        );
        assert_eq!(grid, before);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let mut grid = Grid::new(5).unwrap();
        assert_eq!(
            populate(&mut grid, 1),
            Err(ProblemError::DimensionMismatch {
                id: 1,
                expected: 4,
                found: 5
            })
        );
    }

    #[test]
    fn first_problem_has_hot_top_row() {
        let grid = load(1).unwrap();
        assert_eq!(grid.dimension(), 4);
        assert_eq!(grid.rows().next().unwrap(), &[10.0; 4]);
        for row in 1..4 {
            assert_eq!(grid.get(row, 0), 0.0);
            assert_eq!(grid.get(row, 3), 0.0);
        }
        assert_eq!(grid.get(1, 1), 0.0);
    }

    #[test]
    fn ramps_interpolate_linearly() {
        let grid = load(3).unwrap();
        assert_eq!(grid.get(0, 0), 1.0);
        assert_eq!(grid.get(0, 5), 0.0);
        assert!((grid.get(5, 1) - 0.8).abs() < 1e-12);
        assert_eq!(grid.get(3, 0), 1.0);
        assert_eq!(grid.get(3, 5), 0.0);
    }

    #[test]
    fn every_problem_loads_deterministically() {
        for (id, problem) in catalogue() {
            let grid = load(id).unwrap();
            assert_eq!(grid.dimension(), problem.dimension);
            assert_eq!(grid, load(id).unwrap());
        }
    }
}
