//! Distributed Conjugate Gradient solver.
//!
//! Classical CG for dense symmetric positive-definite systems, with every
//! global quantity computed by a collective:
//!
//! ```text
//! x = 0, r = b, p = b, rr = bb = <b, b>
//! for k = 1..=max_iterations
//!     Ap    = A p                      (distributed mat-vec)
//!     alpha = rr / <p, Ap>             (distributed dot)
//!     x    += alpha p
//!     r    -= alpha Ap
//!     rr'   = <r, r>                   (distributed dot)
//!     beta  = rr' / rr, rr = rr'
//!     stop if sqrt(rr / bb) < rel_error
//!     p     = r + beta p
//! ```
//!
//! Vectors `x`, `r`, `p` and `Ap` are replicated: every worker updates the
//! full vectors with the backend's thread-parallel `axpby`, while the
//! reductions and the mat-vec split rows across workers. Iteration `k + 1`
//! starts only after every collective of iteration `k` has completed.

pub mod matvec;
pub mod reduction;

use std::sync::Arc;

use log::{debug, info};
use ndarray::Array1;

use hycg_compute::{Collective, ComputeBackend};

use self::matvec::DistributedMatVec;
use self::reduction::distributed_dot;
use super::{LinearSolver, SolverError};
use crate::partition::RowPartition;
use crate::problem::Problem;
use crate::types::{SolveReport, SolveStatus, SolverParams};

/// The distributed CG solver for one worker of a group.
pub struct ConjugateGradient {
    /// Shared-memory execution of the local loops.
    pub backend: Arc<dyn ComputeBackend>,
    /// The worker group this solver participates in.
    pub group: Arc<dyn Collective>,
}

impl ConjugateGradient {
    pub fn new(backend: Arc<dyn ComputeBackend>, group: Arc<dyn Collective>) -> Self {
        Self { backend, group }
    }

    fn dot(&self, rows: &std::ops::Range<usize>, x: &[f64], y: &[f64]) -> Result<f64, SolverError> {
        distributed_dot(self.group.as_ref(), self.backend.as_ref(), rows.clone(), x, y)
    }

    fn breakdown(&self, iteration: usize, quantity: &'static str, value: f64) -> SolverError {
        if self.group.is_root() {
            log::warn!("CG breakdown at iteration {}: {} = {:e}", iteration, quantity, value);
        }
        SolverError::NumericalBreakdown {
            iteration,
            quantity,
            value,
        }
    }
}

impl LinearSolver for ConjugateGradient {
    fn solve(&self, problem: &Problem, params: &SolverParams) -> Result<SolveReport, SolverError> {
        let n = problem.size();
        let a = problem.matrix_data()?;
        let b = problem.rhs_data()?;
        let backend = self.backend.as_ref();
        let partition = RowPartition::new(n, self.group.size());
        let rows = partition.range(self.group.rank());
        let mut matvec = DistributedMatVec::new(self.group.as_ref(), backend, partition)?;

        // Per-solve buffers, released on every return path.
        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let mut p = b.to_vec();
        let mut ap = vec![0.0; n];
        let mut history = Vec::new();

        let bb = self.dot(&rows, b, b)?;
        let mut rr = bb;

        if self.group.is_root() {
            debug!(
                "CG start: n={}, workers={}, backend={}, |b|={:e}",
                n,
                self.group.size(),
                backend.device_info().name,
                bb.sqrt()
            );
        }

        // b = 0 has the exact solution x = 0; avoid 0/0 in the ratio.
        if bb == 0.0 {
            return Ok(SolveReport {
                status: SolveStatus::Converged,
                iterations: 0,
                relative_residual: 0.0,
                residual_history: history,
                solution: Array1::from_vec(x),
            });
        }

        let mut status = SolveStatus::NotConverged;
        let mut iterations = params.max_iterations;

        for k in 1..=params.max_iterations {
            matvec.apply(1.0, a, &p, 0.0, &mut ap)?;

            let p_ap = self.dot(&rows, &p, &ap)?;
            if params.detect_breakdown && !(p_ap.is_finite() && p_ap > 0.0) {
                return Err(self.breakdown(k, "<p, Ap>", p_ap));
            }
            let alpha = rr / p_ap;

            backend.axpby(alpha, &p, 1.0, &mut x)?;
            backend.axpby(-alpha, &ap, 1.0, &mut r)?;

            let rr_new = self.dot(&rows, &r, &r)?;
            if params.detect_breakdown && !rr_new.is_finite() {
                return Err(self.breakdown(k, "<r, r>", rr_new));
            }
            let beta = rr_new / rr;
            rr = rr_new;

            let rel = (rr / bb).sqrt();
            if params.record_history {
                history.push(rel);
            }
            if self.group.is_root() {
                debug!("iter {:>5}: rel residual {:.6e}", k, rel);
            }

            if rel < params.rel_error || rr == 0.0 {
                status = SolveStatus::Converged;
                iterations = k;
                break;
            }

            backend.axpby(1.0, &r, beta, &mut p)?;
        }

        let report = SolveReport {
            status,
            iterations,
            relative_residual: (rr / bb).sqrt(),
            residual_history: history,
            solution: Array1::from_vec(x),
        };
        if self.group.is_root() {
            info!("{}", report.summary());
        }
        Ok(report)
    }

    fn method_name(&self) -> &str {
        "Conjugate Gradient"
    }
}
