//! Linear solver abstraction and implementations.
//!
//! The [`LinearSolver`] trait is the interface the command-line driver runs
//! against. The distributed Conjugate Gradient method ([`cg`]) is the
//! implementation for dense symmetric positive-definite systems.

pub mod cg;

use hycg_compute::{CollectiveError, ComputeError};
use thiserror::Error;

use crate::problem::{Problem, ValidationError};
use crate::types::{SolveReport, SolverParams};

/// Errors that can occur during a solve.
///
/// Running out of iterations is not an error: it is reported through
/// [`SolveStatus::NotConverged`](crate::SolveStatus::NotConverged).
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Numerical breakdown at iteration {iteration}: {quantity} = {value:e}")]
    NumericalBreakdown {
        iteration: usize,
        quantity: &'static str,
        value: f64,
    },

    #[error("Dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Problem size {0} does not fit in memory on this platform")]
    SizeOverflow(u64),

    #[error("{0} storage is not contiguous")]
    NonContiguous(&'static str),

    #[error("Invalid problem: {0}")]
    Validation(#[from] ValidationError),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Collective error: {0}")]
    Collective(#[from] CollectiveError),
}

/// The interface every linear solver implements.
pub trait LinearSolver {
    /// Solve `problem` and return the outcome, identical on every worker.
    fn solve(&self, problem: &Problem, params: &SolverParams) -> Result<SolveReport, SolverError>;

    /// Human-readable name of the method.
    fn method_name(&self) -> &str;
}
