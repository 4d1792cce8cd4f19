//! Distributed dense matrix-vector product.
//!
//! Every worker holds the full matrix but computes only its own block of
//! rows; an all-gather then stitches the blocks back into a replicated
//! result. This product dominates the cost of a CG iteration.

use hycg_compute::{Collective, ComputeBackend};

use crate::partition::RowPartition;
use crate::solver::SolverError;

/// Reusable $\mathbf{y} \leftarrow \alpha \mathbf{A}\mathbf{x} + \beta \mathbf{y}$
/// operator for one worker.
///
/// Owns the row-block scratch buffer, so a solve allocates it once rather
/// than once per product.
pub struct DistributedMatVec<'a> {
    group: &'a dyn Collective,
    backend: &'a dyn ComputeBackend,
    partition: RowPartition,
    counts: Vec<usize>,
    local: Vec<f64>,
}

impl<'a> DistributedMatVec<'a> {
    /// Fails when `partition` was built for a different number of workers
    /// than `group` has.
    pub fn new(
        group: &'a dyn Collective,
        backend: &'a dyn ComputeBackend,
        partition: RowPartition,
    ) -> Result<Self, SolverError> {
        if partition.workers() != group.size() {
            return Err(SolverError::DimensionMismatch {
                what: "matvec partition workers",
                expected: group.size(),
                got: partition.workers(),
            });
        }
        let local = vec![0.0; partition.range(group.rank()).len()];
        Ok(Self {
            group,
            backend,
            partition,
            counts: partition.counts(),
            local,
        })
    }

    /// Apply the product to the replicated `y`.
    ///
    /// `a` is the full row-major `n x n` matrix. On return `y` is complete
    /// and identical on every worker.
    pub fn apply(
        &mut self,
        alpha: f64,
        a: &[f64],
        x: &[f64],
        beta: f64,
        y: &mut [f64],
    ) -> Result<(), SolverError> {
        let n = self.partition.size();
        for (what, got) in [("matvec x", x.len()), ("matvec y", y.len())] {
            if got != n {
                return Err(SolverError::DimensionMismatch { what, expected: n, got });
            }
        }
        if a.len() != n * n {
            return Err(SolverError::DimensionMismatch {
                what: "matvec matrix",
                expected: n * n,
                got: a.len(),
            });
        }

        let rows = self.partition.range(self.group.rank());
        self.local.copy_from_slice(&y[rows.clone()]);
        self.backend
            .gemv_rows(alpha, &a[rows.start * n..rows.end * n], x, beta, &mut self.local)?;
        self.group.all_gather(&self.local, &self.counts, y)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hycg_compute::{SerialBackend, SingleProcess, ThreadGroup};

    fn test_matrix(n: usize) -> Vec<f64> {
        (0..n * n).map(|k| ((k * 7) % 13) as f64 - 6.0).collect()
    }

    fn reference(alpha: f64, a: &[f64], x: &[f64], beta: f64, y: &[f64]) -> Vec<f64> {
        let n = x.len();
        (0..n)
            .map(|r| {
                let s: f64 = (0..n).map(|c| a[r * n + c] * x[c]).sum();
                beta * y[r] + alpha * s
            })
            .collect()
    }

    #[test]
    fn test_single_worker_matches_reference() {
        let n = 5;
        let a = test_matrix(n);
        let x: Vec<f64> = (0..n).map(|i| i as f64 + 0.5).collect();
        let mut y = vec![1.0; n];
        let expected = reference(2.0, &a, &x, -1.0, &y);

        let mut op =
            DistributedMatVec::new(&SingleProcess, &SerialBackend, RowPartition::new(n, 1)).unwrap();
        op.apply(2.0, &a, &x, -1.0, &mut y).unwrap();
        assert_eq!(y, expected);
    }

    #[test]
    fn test_every_worker_holds_full_result() {
        let n = 7;
        let a = test_matrix(n);
        let x: Vec<f64> = (0..n).map(|i| 1.0 / (i as f64 + 1.0)).collect();
        let y0: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let expected = reference(1.0, &a, &x, 0.5, &y0);

        for workers in [2, 3, 4, 7] {
            let partition = RowPartition::new(n, workers);
            let results = ThreadGroup::run(workers, |member| {
                let mut y = y0.clone();
                let mut op = DistributedMatVec::new(&member, &SerialBackend, partition).unwrap();
                op.apply(1.0, &a, &x, 0.5, &mut y).unwrap();
                // Second product reuses the scratch buffer.
                let mut z = vec![0.0; n];
                op.apply(1.0, &a, &x, 0.0, &mut z).unwrap();
                (y, z)
            })
            .unwrap();
            let expected_z = reference(1.0, &a, &x, 0.0, &vec![0.0; n]);
            for (y, z) in results {
                assert_eq!(y, expected, "W={}", workers);
                assert_eq!(z, expected_z, "W={}", workers);
            }
        }
    }

    #[test]
    fn test_rejects_wrong_matrix_size() {
        let mut op =
            DistributedMatVec::new(&SingleProcess, &SerialBackend, RowPartition::new(2, 1)).unwrap();
        let mut y = [0.0; 2];
        let err = op.apply(1.0, &[1.0; 3], &[1.0; 2], 0.0, &mut y).unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { what: "matvec matrix", .. }));
    }

    #[test]
    fn test_partition_for_other_group_size_rejected() {
        let results = ThreadGroup::run(2, |member| {
            DistributedMatVec::new(&member, &SerialBackend, RowPartition::new(6, 3)).err()
        })
        .unwrap();
        for err in results {
            assert!(matches!(
                err,
                Some(SolverError::DimensionMismatch { expected: 2, got: 3, .. })
            ));
        }
        let single =
            DistributedMatVec::new(&SingleProcess, &SerialBackend, RowPartition::new(4, 2));
        assert!(single.is_err());
    }
}
