//! CPU compute backend using Rayon for shared-memory parallelism.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::backend::{check_len, BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// Default minimum number of elements per parallel task. Below this a
/// parallel region costs more than it saves.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// CPU backend that parallelises work across a dedicated Rayon pool.
///
/// Each worker of a distributed group owns its own pool, so the thread
/// count here is per worker, not per machine.
pub struct CpuBackend {
    pool: ThreadPool,
    num_threads: usize,
    threshold: usize,
}

impl CpuBackend {
    /// Create a new CPU backend using all available threads.
    pub fn new() -> Result<Self, ComputeError> {
        Self::with_threads(rayon::current_num_threads())
    }

    /// Create a CPU backend with a specified thread count.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let num_threads = num_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("hycg-cpu-{}", i))
            .build()
            .map_err(|e| ComputeError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool,
            num_threads,
            threshold: DEFAULT_PARALLEL_THRESHOLD,
        })
    }

    /// Set the minimum number of elements each task of `axpby` and `dot`
    /// handles (clamped to at least 1).
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            threads: self.num_threads,
        }
    }

    fn axpby(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<(), ComputeError> {
        check_len("axpby", x.len(), y.len())?;
        self.pool.install(|| {
            y.par_iter_mut()
                .with_min_len(self.threshold)
                .zip(x.par_iter())
                .for_each(|(yi, &xi)| *yi = alpha * xi + beta * *yi);
        });
        Ok(())
    }

    fn dot(&self, x: &[f64], y: &[f64]) -> Result<f64, ComputeError> {
        check_len("dot", x.len(), y.len())?;
        let sum = self.pool.install(|| {
            x.par_iter()
                .with_min_len(self.threshold)
                .zip(y.par_iter())
                .map(|(&xi, &yi)| xi * yi)
                .sum::<f64>()
        });
        Ok(sum)
    }

    fn gemv_rows(
        &self,
        alpha: f64,
        rows: &[f64],
        x: &[f64],
        beta: f64,
        y: &mut [f64],
    ) -> Result<(), ComputeError> {
        let ncols = x.len();
        check_len("gemv_rows", y.len() * ncols, rows.len())?;
        if ncols == 0 {
            y.iter_mut().for_each(|yi| *yi *= beta);
            return Ok(());
        }
        // One task per row; the inner sum stays serial so each row's value
        // does not depend on the thread count.
        self.pool.install(|| {
            y.par_iter_mut()
                .zip(rows.par_chunks_exact(ncols))
                .for_each(|(yi, row)| {
                    *yi = beta * *yi + alpha * crate::kernels::dot(row, x);
                });
        });
        Ok(())
    }
}
