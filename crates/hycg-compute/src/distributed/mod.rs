//! Distributed worker groups for hybrid-parallel solves.
//!
//! A group is a fixed set of `W` workers with private memory that
//! coordinate only through the collectives of [`Collective`]:
//!
//! - **broadcast**: one-to-all replication (problem data before a solve),
//! - **all-gather**: every worker contributes a row slice and receives the
//!   concatenation (the distributed mat-vec),
//! - **all-reduce (sum)**: every worker receives the same global sum (the
//!   distributed dot product).
//!
//! Every collective is a synchronous barrier. A straggling worker stalls the
//! whole group; there is no timeout or cancellation. In a [`ThreadGroup`] a
//! worker that exits or panics releases its peers with
//! [`CollectiveError::Disconnected`].
//!
//! Implementations:
//! - [`SingleProcess`]: `W = 1`, every collective is a local copy.
//! - [`ThreadGroup`]: `W` in-process workers, one OS thread each, linked by
//!   `crossbeam` channels.
//! - [`MpiGroup`](mpi_comm::MpiGroup) (feature `mpi`): the MPI world communicator.

#[cfg(feature = "mpi")]
pub mod mpi_comm;
mod threads;

pub use threads::{ThreadGroup, ThreadMember};

use thiserror::Error;

/// Errors from collective operations that can be detected locally.
#[derive(Debug, Error)]
pub enum CollectiveError {
    #[error("Root rank {root} out of range for a group of {size}")]
    RootOutOfRange { root: usize, size: usize },

    #[error("Count mismatch in {op}: expected {expected}, got {got}")]
    CountMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Worker {rank} panicked")]
    WorkerPanicked { rank: usize },

    #[error("Worker {rank} left the group")]
    Disconnected { rank: usize },

    #[error("Unexpected {kind} message from worker {from} in {op}")]
    UnexpectedMessage {
        op: &'static str,
        from: usize,
        kind: &'static str,
    },

    #[error("Distributed runtime unavailable: {0}")]
    Unavailable(String),
}

/// Collective operations over a fixed group of workers.
///
/// All methods must be called by every worker of the group in the same
/// order; they block until every worker has contributed.
pub trait Collective: Send + Sync {
    /// This worker's rank in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Replicate `buf` from `root` into every worker's `buf`.
    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), CollectiveError>;

    /// Replicate integer metadata (sizes, status words) from `root`.
    fn broadcast_u64(&self, buf: &mut [u64], root: usize) -> Result<(), CollectiveError>;

    /// Variable-count all-gather.
    ///
    /// Worker `w` contributes `counts[w]` values; they land in `out` at the
    /// offset `counts[..w].sum()`. `out.len()` must equal `counts.iter().sum()`.
    fn all_gather(&self, local: &[f64], counts: &[usize], out: &mut [f64])
        -> Result<(), CollectiveError>;

    /// Sum a local scalar across all workers; every worker gets the result.
    fn all_reduce_sum(&self, local: f64) -> Result<f64, CollectiveError>;

    /// Synchronisation barrier.
    fn barrier(&self) -> Result<(), CollectiveError>;

    /// Whether this worker is the coordinating worker (rank 0).
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Offsets of each worker's block in a gathered buffer.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |offset, &c| {
            let start = *offset;
            *offset += c;
            Some(start)
        })
        .collect()
}

pub(crate) fn check_root(root: usize, size: usize) -> Result<(), CollectiveError> {
    if root < size {
        Ok(())
    } else {
        Err(CollectiveError::RootOutOfRange { root, size })
    }
}

/// Validate the arguments of [`Collective::all_gather`] for worker `rank`.
pub(crate) fn check_gather(
    rank: usize,
    size: usize,
    local: &[f64],
    counts: &[usize],
    out: &[f64],
) -> Result<usize, CollectiveError> {
    if counts.len() != size {
        return Err(CollectiveError::CountMismatch {
            op: "all_gather(counts)",
            expected: size,
            got: counts.len(),
        });
    }
    if local.len() != counts[rank] {
        return Err(CollectiveError::CountMismatch {
            op: "all_gather(local)",
            expected: counts[rank],
            got: local.len(),
        });
    }
    let total: usize = counts.iter().sum();
    if out.len() != total {
        return Err(CollectiveError::CountMismatch {
            op: "all_gather(out)",
            expected: total,
            got: out.len(),
        });
    }
    Ok(total)
}

/// Single-worker group (`W = 1`).
///
/// Trivially satisfies every collective contract; used for single-process
/// runs and as a test double for solver logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Collective for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast(&self, _buf: &mut [f64], root: usize) -> Result<(), CollectiveError> {
        // Single process: the root already holds the data.
        check_root(root, 1)
    }

    fn broadcast_u64(&self, _buf: &mut [u64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, 1)
    }

    fn all_gather(
        &self,
        local: &[f64],
        counts: &[usize],
        out: &mut [f64],
    ) -> Result<(), CollectiveError> {
        check_gather(0, 1, local, counts, out)?;
        out.copy_from_slice(local);
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CollectiveError> {
        Ok(local)
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        Ok(())
    }
}
