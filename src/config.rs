use core::num::NonZeroUsize;
use derive_more::Display;
use thiserror::Error;

/// Error kind for rejected solver configurations.
///
/// Produced before any scheduling starts: a zero thread budget would leave the
/// admission loop waiting forever for a slot that can never exist.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The thread budget is zero.
    #[error("thread budget must be at least 1")]
    ZeroThreads,
    /// The precision is zero, negative, NaN or infinite.
    #[error("precision must be a finite value greater than 0, got {0}")]
    NonPositivePrecision(f64),
}

/// How the orchestrator waits for a free admission slot.
#[derive(Debug, Display, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Admission {
    /// Re-scan the slot table in a busy loop until a slot frees up.
    #[display("spin")]
    Spin,
    /// Park on a condition variable that every released slot signals.
    #[default]
    #[display("block")]
    Block,
}

/// Parameters of a single solve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolveConfig {
    threads: NonZeroUsize,
    precision: f64,
    admission: Admission,
}

impl SolveConfig {
    /// Validate a thread budget and a precision.
    ///
    /// # Errors
    /// If `threads` is zero, or `precision` is not a finite positive number.
    pub fn new(threads: usize, precision: f64) -> Result<Self, ConfigError> {
        let threads = NonZeroUsize::new(threads).ok_or(ConfigError::ZeroThreads)?;
        if !(precision.is_finite() && precision > 0.0) {
            return Err(ConfigError::NonPositivePrecision(precision));
        }
        Ok(Self {
            threads,
            precision,
            admission: Admission::default(),
        })
    }

    /// Replace the admission policy.
    #[must_use]
    pub const fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    /// Maximum number of update tasks in flight at once.
    #[must_use]
    pub const fn threads(&self) -> NonZeroUsize {
        self.threads
    }

    /// A cell counts as solved once a recomputation moves it by strictly less
    /// than this amount.
    #[must_use]
    pub const fn precision(&self) -> f64 {
        self.precision
    }

    /// Policy used while waiting for a free slot.
    #[must_use]
    pub const fn admission(&self) -> Admission {
        self.admission
    }
}
