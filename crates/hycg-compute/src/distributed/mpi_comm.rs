//! MPI worker group.
//!
//! Requires the `mpi` feature flag and an MPI installation. Each process of
//! an `mpiexec` launch is one worker; the world communicator is the group.
//!
//! ```ignore
//! let (_universe, group) = MpiGroup::initialize()?;
//! // ... solve ...
//! // MPI is finalised when `_universe` is dropped.
//! ```

use ::mpi::collective::SystemOperation;
use ::mpi::datatype::PartitionMut;
use ::mpi::environment::Universe;
use ::mpi::topology::SimpleCommunicator;
use ::mpi::traits::*;
use ::mpi::Count;

use super::{check_gather, check_root, displacements, Collective, CollectiveError};

/// Worker group backed by the MPI world communicator.
///
/// Holds no communicator handle of its own; the world communicator is
/// looked up per call, which keeps the type `Send + Sync`.
pub struct MpiGroup {
    rank: usize,
    size: usize,
}

impl MpiGroup {
    /// Initialise MPI and wrap the world communicator.
    ///
    /// The returned [`Universe`] must outlive every use of the group;
    /// dropping it finalises MPI.
    pub fn initialize() -> Result<(Universe, Self), CollectiveError> {
        let universe = ::mpi::initialize().ok_or_else(|| {
            CollectiveError::Unavailable("MPI already initialised or unavailable".into())
        })?;
        let world = universe.world();
        let group = Self {
            rank: world.rank() as usize,
            size: world.size() as usize,
        };
        log::debug!("MPI worker {} of {} ready", group.rank, group.size);
        Ok((universe, group))
    }

    fn world(&self) -> SimpleCommunicator {
        SimpleCommunicator::world()
    }
}

fn to_count(n: usize) -> Result<Count, CollectiveError> {
    Count::try_from(n).map_err(|_| {
        CollectiveError::Unavailable(format!("{} elements exceed the MPI count range", n))
    })
}

impl Collective for MpiGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, self.size)?;
        self.world().process_at_rank(to_count(root)?).broadcast_into(buf);
        Ok(())
    }

    fn broadcast_u64(&self, buf: &mut [u64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, self.size)?;
        self.world().process_at_rank(to_count(root)?).broadcast_into(buf);
        Ok(())
    }

    fn all_gather(
        &self,
        local: &[f64],
        counts: &[usize],
        out: &mut [f64],
    ) -> Result<(), CollectiveError> {
        check_gather(self.rank, self.size, local, counts, out)?;
        let mpi_counts = counts
            .iter()
            .map(|&c| to_count(c))
            .collect::<Result<Vec<_>, _>>()?;
        let mpi_displs = displacements(counts)
            .into_iter()
            .map(to_count)
            .collect::<Result<Vec<_>, _>>()?;
        let mut partition = PartitionMut::new(out, &mpi_counts[..], &mpi_displs[..]);
        self.world().all_gather_varcount_into(local, &mut partition);
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CollectiveError> {
        let mut global = 0.0f64;
        self.world()
            .all_reduce_into(&local, &mut global, SystemOperation::sum());
        Ok(global)
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        self.world().barrier();
        Ok(())
    }
}
