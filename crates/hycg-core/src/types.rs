//! Core types shared across the hycg workspace.
//!
//! Solver parameters coming in, solve reports going out.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Parameters controlling an iterative solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverParams {
    /// Iteration budget. Zero means the loop body never runs.
    pub max_iterations: usize,
    /// Target relative residual $\|\mathbf{r}\|_2 / \|\mathbf{b}\|_2$.
    pub rel_error: f64,
    /// Abort with [`NumericalBreakdown`](crate::SolverError::NumericalBreakdown)
    /// when a reduction denominator stops being positive and finite.
    pub detect_breakdown: bool,
    /// Keep the relative residual of every iteration in the report.
    pub record_history: bool,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            rel_error: 1e-9,
            detect_breakdown: true,
            record_history: false,
        }
    }
}

/// Terminal state of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Tolerance reached within the iteration budget.
    Converged,
    /// Budget exhausted. The best available iterate is still returned.
    NotConverged,
}

/// Outcome of a solve, identical on every worker.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Converging iteration when converged, the budget otherwise.
    pub iterations: usize,
    /// Final $\sqrt{rr / bb}$.
    pub relative_residual: f64,
    /// Relative residual after each iteration (empty unless requested).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub residual_history: Vec<f64>,
    /// Solution estimate, replicated on every worker.
    #[serde(skip)]
    pub solution: Array1<f64>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    /// One-line summary in the solver's report format.
    pub fn summary(&self) -> String {
        match self.status {
            SolveStatus::Converged => format!(
                "Converged in {} iterations, relative error is {:e}",
                self.iterations, self.relative_residual
            ),
            SolveStatus::NotConverged => format!(
                "Did not converge in {} iterations, relative error is {:e}",
                self.iterations, self.relative_residual
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = SolverParams::default();
        assert_eq!(params.max_iterations, 1000);
        assert_eq!(params.rel_error, 1e-9);
        assert!(params.detect_breakdown);
        assert!(!params.record_history);
    }

    #[test]
    fn test_summary_lines() {
        let mut report = SolveReport {
            status: SolveStatus::Converged,
            iterations: 3,
            relative_residual: 2.5e-12,
            residual_history: Vec::new(),
            solution: Array1::zeros(3),
        };
        assert_eq!(report.summary(), "Converged in 3 iterations, relative error is 2.5e-12");
        report.status = SolveStatus::NotConverged;
        report.iterations = 10;
        report.relative_residual = 1.0;
        assert_eq!(report.summary(), "Did not converge in 10 iterations, relative error is 1e0");
    }
}
