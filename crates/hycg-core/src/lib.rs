//! # hycg Core
//!
//! The numerical engine of hycg: a hybrid-parallel Conjugate Gradient solver
//! for dense symmetric positive-definite systems $\mathbf{A}\mathbf{x} = \mathbf{b}$.
//!
//! ## Architecture
//!
//! Work is split over two tiers. A group of workers (see
//! [`hycg_compute::Collective`]) each own a contiguous block of rows, and
//! inside each worker a [`hycg_compute::ComputeBackend`] spreads the local
//! loops over threads. The solver only ever talks to those two traits.
//!
//! ## Modules
//!
//! - [`types`]: Solver parameters and solve reports.
//! - [`partition`]: Row ownership across workers.
//! - [`problem`]: Problem container, dimension checks, replication.
//! - [`solver`]: Solver trait and the distributed CG implementation.

pub mod partition;
pub mod problem;
pub mod solver;
pub mod types;

pub use partition::RowPartition;
pub use problem::{broadcast_problem, validate_dimensions, Problem, ValidationError};
pub use solver::cg::ConjugateGradient;
pub use solver::{LinearSolver, SolverError};
pub use types::{SolveReport, SolveStatus, SolverParams};
