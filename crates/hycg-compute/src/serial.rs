//! Single-threaded backend.
//!
//! Runs the serial [`kernels`](crate::kernels) directly. Results are
//! bit-identical from run to run, which makes this the backend of choice
//! for reference outputs and reproducibility tests.

use crate::backend::{check_len, BackendType, ComputeBackend, ComputeError, DeviceInfo};
use crate::kernels;

/// Backend that executes every kernel on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial".into(),
            backend_type: BackendType::Serial,
            threads: 1,
        }
    }

    fn axpby(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<(), ComputeError> {
        check_len("axpby", x.len(), y.len())?;
        kernels::axpby(alpha, x, beta, y);
        Ok(())
    }

    fn dot(&self, x: &[f64], y: &[f64]) -> Result<f64, ComputeError> {
        check_len("dot", x.len(), y.len())?;
        Ok(kernels::dot(x, y))
    }

    fn gemv_rows(
        &self,
        alpha: f64,
        rows: &[f64],
        x: &[f64],
        beta: f64,
        y: &mut [f64],
    ) -> Result<(), ComputeError> {
        check_len("gemv_rows", y.len() * x.len(), rows.len())?;
        kernels::gemv_rows(alpha, rows, x.len(), x, beta, y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_rejects_mismatched_lengths() {
        let backend = SerialBackend;
        let mut y = [0.0; 2];
        assert!(backend.axpby(1.0, &[1.0; 3], 1.0, &mut y).is_err());
        assert!(backend.dot(&[1.0; 3], &[1.0; 2]).is_err());
        assert!(backend.gemv_rows(1.0, &[1.0; 5], &[1.0; 3], 0.0, &mut y).is_err());
    }

    #[test]
    fn test_serial_gemv_identity() {
        let backend = SerialBackend;
        let a = [1.0, 0.0, 0.0, 1.0];
        let mut y = [9.0, 9.0];
        backend.gemv_rows(1.0, &a, &[3.0, 4.0], 0.0, &mut y).unwrap();
        assert_eq!(y, [3.0, 4.0]);
    }
}
