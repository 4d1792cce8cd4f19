//! Distributed dot product.

use std::ops::Range;

use hycg_compute::{Collective, ComputeBackend};

use crate::solver::SolverError;

/// Global $\mathbf{x} \cdot \mathbf{y}$ for replicated full-length vectors.
///
/// Each worker reduces its own `rows` on the backend, then the partial sums
/// are combined with an all-reduce. Blocking: returns only once every worker
/// has contributed, and every worker gets the same value.
pub fn distributed_dot(
    group: &dyn Collective,
    backend: &dyn ComputeBackend,
    rows: Range<usize>,
    x: &[f64],
    y: &[f64],
) -> Result<f64, SolverError> {
    if x.len() != y.len() {
        return Err(SolverError::DimensionMismatch {
            what: "distributed_dot",
            expected: x.len(),
            got: y.len(),
        });
    }
    if rows.end > x.len() {
        return Err(SolverError::DimensionMismatch {
            what: "distributed_dot rows",
            expected: x.len(),
            got: rows.end,
        });
    }
    let local = backend.dot(&x[rows.clone()], &y[rows])?;
    Ok(group.all_reduce_sum(local)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::RowPartition;
    use hycg_compute::{SerialBackend, SingleProcess, ThreadGroup};

    #[test]
    fn test_single_worker_dot() {
        let x = [1.0, 2.0, 3.0];
        let d = distributed_dot(&SingleProcess, &SerialBackend, 0..3, &x, &x).unwrap();
        assert_eq!(d, 14.0);
    }

    #[test]
    fn test_uneven_partition_sums_every_row_once() {
        let n = 11;
        let x: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        let expected: f64 = x.iter().map(|v| v * v).sum();
        for workers in 1..=5 {
            let partition = RowPartition::new(n, workers);
            let results = ThreadGroup::run(workers, |member| {
                let rows = partition.range(member.rank());
                distributed_dot(&member, &SerialBackend, rows, &x, &x).unwrap()
            })
            .unwrap();
            for d in results {
                assert_eq!(d, expected, "W={}", workers);
            }
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = distributed_dot(&SingleProcess, &SerialBackend, 0..2, &[1.0, 2.0], &[1.0])
            .unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { .. }));
    }
}
