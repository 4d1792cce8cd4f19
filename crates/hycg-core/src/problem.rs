//! Problem container, dimension checks and replication across workers.

use ndarray::{Array1, Array2};
use thiserror::Error;

use hycg_compute::Collective;

use crate::solver::SolverError;

/// Rank that owns the authoritative copy of the problem.
pub const ROOT: usize = 0;

const STATUS_OK: u64 = 0;
const STATUS_ABORT: u64 = 1;

/// Structural mismatch among the loaded matrix and right-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Matrix has to be square (got {rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },

    #[error("Size of right hand side ({rhs_rows}) does not match the matrix ({matrix_rows})")]
    SizeMismatch { matrix_rows: usize, rhs_rows: usize },

    #[error("Right hand side has to have just a single column (got {cols})")]
    MultipleColumns { cols: usize },
}

/// Check the dimensions of a matrix `(rows, cols)` and a right-hand side
/// `(rows, cols)` record, returning the system size.
///
/// Rules are checked in order: square matrix, matching row counts, single
/// right-hand-side column.
pub fn validate_dimensions(
    matrix: (usize, usize),
    rhs: (usize, usize),
) -> Result<usize, ValidationError> {
    let (rows, cols) = matrix;
    if rows != cols {
        return Err(ValidationError::NotSquare { rows, cols });
    }
    if rhs.0 != rows {
        return Err(ValidationError::SizeMismatch {
            matrix_rows: rows,
            rhs_rows: rhs.0,
        });
    }
    if rhs.1 != 1 {
        return Err(ValidationError::MultipleColumns { cols: rhs.1 });
    }
    Ok(rows)
}

/// A dense system $\mathbf{A}\mathbf{x} = \mathbf{b}$.
///
/// The matrix is always stored row-major and contiguous, so row blocks can
/// be handed to the backends as plain slices.
#[derive(Debug, Clone)]
pub struct Problem {
    matrix: Array2<f64>,
    rhs: Array1<f64>,
}

impl Problem {
    pub fn new(matrix: Array2<f64>, rhs: Array1<f64>) -> Result<Self, ValidationError> {
        validate_dimensions(matrix.dim(), (rhs.len(), 1))?;
        let matrix = if matrix.is_standard_layout() {
            matrix
        } else {
            matrix.as_standard_layout().into_owned()
        };
        Ok(Self { matrix, rhs })
    }

    /// System size `n` (the matrix is `n x n`).
    pub fn size(&self) -> usize {
        self.rhs.len()
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn rhs(&self) -> &Array1<f64> {
        &self.rhs
    }

    pub(crate) fn matrix_data(&self) -> Result<&[f64], SolverError> {
        self.matrix.as_slice().ok_or(SolverError::NonContiguous("matrix"))
    }

    pub(crate) fn rhs_data(&self) -> Result<&[f64], SolverError> {
        self.rhs.as_slice().ok_or(SolverError::NonContiguous("rhs"))
    }

    fn into_raw(self) -> (Vec<f64>, Vec<f64>) {
        (self.matrix.into_raw_vec(), self.rhs.into_raw_vec())
    }
}

/// Replicate the root's problem on every worker.
///
/// The root passes `Some(problem)` when loading and validation succeeded and
/// `None` otherwise; other workers pass `None`. The root first broadcasts a
/// `[status, size]` header, so on failure every worker returns `Ok(None)`
/// together and nobody is left waiting in a later collective. Non-root
/// workers allocate their replicas only after the header arrives.
pub fn broadcast_problem(
    group: &dyn Collective,
    root_problem: Option<Problem>,
) -> Result<Option<Problem>, SolverError> {
    let is_root = group.rank() == ROOT;
    let root_problem = if is_root { root_problem } else { None };

    let mut header = match &root_problem {
        Some(problem) => [STATUS_OK, problem.size() as u64],
        None => [STATUS_ABORT, 0],
    };
    group.broadcast_u64(&mut header, ROOT)?;
    if header[0] != STATUS_OK {
        log::debug!("worker {}: root aborted before broadcast", group.rank());
        return Ok(None);
    }

    let size = usize::try_from(header[1]).map_err(|_| SolverError::SizeOverflow(header[1]))?;
    let elements = size
        .checked_mul(size)
        .ok_or(SolverError::SizeOverflow(header[1]))?;
    let (mut matrix, mut rhs) = match root_problem {
        Some(problem) => problem.into_raw(),
        None => (vec![0.0; elements], vec![0.0; size]),
    };
    group.broadcast(&mut matrix, ROOT)?;
    group.broadcast(&mut rhs, ROOT)?;

    let got = matrix.len();
    let matrix = Array2::from_shape_vec((size, size), matrix).map_err(|_| {
        SolverError::DimensionMismatch {
            what: "broadcast matrix",
            expected: elements,
            got,
        }
    })?;
    let problem = Problem::new(matrix, Array1::from_vec(rhs))?;
    log::debug!("worker {}: received problem of size {}", group.rank(), size);
    Ok(Some(problem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hycg_compute::{SingleProcess, ThreadGroup};
    use ndarray::array;

    #[test]
    fn test_validation_order() {
        assert_eq!(validate_dimensions((3, 3), (3, 1)), Ok(3));
        assert_eq!(
            validate_dimensions((3, 4), (2, 2)),
            Err(ValidationError::NotSquare { rows: 3, cols: 4 })
        );
        assert_eq!(
            validate_dimensions((3, 3), (2, 2)),
            Err(ValidationError::SizeMismatch { matrix_rows: 3, rhs_rows: 2 })
        );
        assert_eq!(
            validate_dimensions((3, 3), (3, 2)),
            Err(ValidationError::MultipleColumns { cols: 2 })
        );
    }

    #[test]
    fn test_problem_rejects_non_square() {
        let err = Problem::new(Array2::zeros((3, 4)), Array1::zeros(3)).unwrap_err();
        assert_eq!(err, ValidationError::NotSquare { rows: 3, cols: 4 });
    }

    #[test]
    fn test_problem_forces_row_major() {
        let transposed = array![[1.0, 2.0], [3.0, 4.0]].reversed_axes();
        let problem = Problem::new(transposed, array![1.0, 1.0]).unwrap();
        assert_eq!(problem.matrix_data().unwrap(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_broadcast_single_process_passthrough() {
        let problem = Problem::new(array![[2.0]], array![4.0]).unwrap();
        let received = broadcast_problem(&SingleProcess, Some(problem)).unwrap().unwrap();
        assert_eq!(received.size(), 1);
        assert_eq!(received.rhs()[0], 4.0);
    }

    #[test]
    fn test_broadcast_replicates_to_all_workers() {
        let results = ThreadGroup::run(3, |member| {
            let root_problem = (member.rank() == ROOT).then(|| {
                Problem::new(array![[4.0, 1.0], [1.0, 3.0]], array![1.0, 2.0]).unwrap()
            });
            let problem = broadcast_problem(&member, root_problem).unwrap().unwrap();
            (problem.matrix().clone(), problem.rhs().clone())
        })
        .unwrap();
        for (matrix, rhs) in results {
            assert_eq!(matrix, array![[4.0, 1.0], [1.0, 3.0]]);
            assert_eq!(rhs, array![1.0, 2.0]);
        }
    }

    #[test]
    fn test_root_abort_releases_every_worker() {
        let results = ThreadGroup::run(4, |member| {
            broadcast_problem(&member, None).unwrap().is_none()
        })
        .unwrap();
        assert!(results.into_iter().all(|aborted| aborted));
    }
}
