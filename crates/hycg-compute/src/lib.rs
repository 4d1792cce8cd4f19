//! # hycg Compute
//!
//! Execution layer for the hycg solver. This crate provides two seams that
//! keep the Conjugate Gradient engine in `hycg-core` independent of where it
//! runs:
//!
//! - a [`ComputeBackend`](backend::ComputeBackend) trait for the shared-memory
//!   tier (vector updates, local dot products, row-block mat-vec), and
//! - a [`Collective`](distributed::Collective) trait for the distributed tier
//!   (broadcast, all-gather, all-reduce across a fixed group of workers).
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Notes |
//! |---------|-------------|-------|
//! | Serial | always | Deterministic, bit-exact reference |
//! | CPU (Rayon) | `cpu` (default) | Dedicated thread pool per worker |
//!
//! ## Available worker groups
//!
//! | Group | Feature flag | Notes |
//! |-------|-------------|-------|
//! | Single process | always | `W = 1`, collectives are local copies |
//! | Thread group | always | `W` in-process workers linked by crossbeam channels |
//! | MPI | `mpi` | World communicator via the `mpi` crate |

pub mod backend;
pub mod distributed;
pub mod kernels;
pub mod serial;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{create_backend, BackendType, ComputeBackend, ComputeError, DeviceInfo};
pub use distributed::{Collective, CollectiveError, SingleProcess, ThreadGroup, ThreadMember};
pub use serial::SerialBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

#[cfg(feature = "mpi")]
pub use distributed::mpi_comm::MpiGroup;
