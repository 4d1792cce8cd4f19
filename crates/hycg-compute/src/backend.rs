//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over how a single worker executes
//! its share of the work (one thread, or a pool of threads) so that the
//! Conjugate Gradient engine in `hycg-core` stays execution-agnostic.

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Length mismatch in {op}: expected {expected}, got {got}")]
    LengthMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub threads: usize,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Single-threaded, fixed summation order.
    Serial,
    /// Rayon thread pool.
    Cpu,
    /// Best available: CPU when compiled in, serial otherwise.
    Auto,
}

impl FromStr for BackendType {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "cpu" => Ok(Self::Cpu),
            "auto" => Ok(Self::Auto),
            other => Err(ComputeError::Unavailable(format!(
                "unknown backend '{}'. Valid backends: serial, cpu, auto",
                other
            ))),
        }
    }
}

/// Abstraction over shared-memory execution of the solver's hot loops.
///
/// Every method works on plain slices: the distributed layer hands each
/// worker its own row range, and the backend decides how to spread that
/// range over threads. Implementations must produce results equal to the
/// serial [`kernels`](crate::kernels) up to floating-point summation order.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// $\mathbf{y} \leftarrow \alpha \mathbf{x} + \beta \mathbf{y}$.
    fn axpby(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<(), ComputeError>;

    /// Local inner product $\sum_i x_i y_i$.
    fn dot(&self, x: &[f64], y: &[f64]) -> Result<f64, ComputeError>;

    /// Row-block dense product.
    ///
    /// `rows` holds `y.len()` consecutive rows of a row-major matrix with
    /// `x.len()` columns. Computes `y[r] = beta * y[r] + alpha * A[r, :] . x`.
    fn gemv_rows(
        &self,
        alpha: f64,
        rows: &[f64],
        x: &[f64],
        beta: f64,
        y: &mut [f64],
    ) -> Result<(), ComputeError>;
}

pub(crate) fn check_len(op: &'static str, expected: usize, got: usize) -> Result<(), ComputeError> {
    if expected == got {
        Ok(())
    } else {
        Err(ComputeError::LengthMismatch { op, expected, got })
    }
}

/// Create a compute backend from a backend type and a thread count.
///
/// `threads == 0` means "all logical cores".
/// - `Serial` always succeeds.
/// - `Cpu` fails if the crate was built without the `cpu` feature.
/// - `Auto` prefers CPU and falls back to serial.
pub fn create_backend(
    kind: BackendType,
    threads: usize,
) -> Result<Arc<dyn ComputeBackend>, ComputeError> {
    match kind {
        BackendType::Serial => Ok(Arc::new(crate::SerialBackend)),
        BackendType::Cpu => build_cpu(threads),
        BackendType::Auto => match build_cpu(threads) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                log::warn!("CPU backend unavailable ({}), using serial", e);
                Ok(Arc::new(crate::SerialBackend))
            }
        },
    }
}

#[cfg(feature = "cpu")]
fn build_cpu(threads: usize) -> Result<Arc<dyn ComputeBackend>, ComputeError> {
    let cpu = if threads == 0 {
        crate::CpuBackend::new()?
    } else {
        crate::CpuBackend::with_threads(threads)?
    };
    Ok(Arc::new(cpu))
}

#[cfg(not(feature = "cpu"))]
fn build_cpu(_threads: usize) -> Result<Arc<dyn ComputeBackend>, ComputeError> {
    Err(ComputeError::Unavailable(
        "CPU backend requested but built without the `cpu` feature".into(),
    ))
}
