//! Serial vector kernels.
//!
//! These are the reference implementations every backend must agree with.
//! Summation runs strictly left to right, so results are bit-exact across
//! runs and platforms.

/// $\mathbf{y} \leftarrow \alpha \mathbf{x} + \beta \mathbf{y}$ over the common length.
///
/// The caller guarantees `x.len() == y.len()`; backends check this before
/// dispatching here.
#[inline]
pub fn axpby(alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = alpha * xi + beta * *yi;
    }
}

/// $\sum_i x_i y_i$ with a single running accumulator.
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    let mut acc = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        acc += xi * yi;
    }
    acc
}

/// Dense product over a block of rows.
///
/// `rows` holds `y.len()` consecutive rows of a row-major matrix with `ncols`
/// columns. Computes `y[r] = beta * y[r] + alpha * dot(rows[r], x)`.
pub fn gemv_rows(alpha: f64, rows: &[f64], ncols: usize, x: &[f64], beta: f64, y: &mut [f64]) {
    if ncols == 0 {
        y.iter_mut().for_each(|yi| *yi *= beta);
        return;
    }
    for (yi, row) in y.iter_mut().zip(rows.chunks_exact(ncols)) {
        *yi = beta * *yi + alpha * dot(row, x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axpby_combines_in_place() {
        let x = [1.0, 2.0, 3.0];
        let mut y = [10.0, 20.0, 30.0];
        axpby(2.0, &x, 0.5, &mut y);
        assert_eq!(y, [7.0, 14.0, 21.0]);
    }

    #[test]
    fn test_axpby_beta_zero_overwrites() {
        let x = [1.0, -1.0];
        let mut y = [5.0, 5.0];
        axpby(3.0, &x, 0.0, &mut y);
        assert_eq!(y, [3.0, -3.0]);
    }

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(dot(&[], &[]), 0.0);
    }

    #[test]
    fn test_gemv_rows_block() {
        // Rows 1..3 of a 3x3 matrix.
        let rows = [4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let x = [1.0, 0.0, -1.0];
        let mut y = [1.0, 1.0];
        gemv_rows(2.0, &rows, 3, &x, 1.0, &mut y);
        assert_eq!(y, [1.0 + 2.0 * -2.0, 1.0 + 2.0 * -2.0]);
    }

    #[test]
    fn test_gemv_rows_zero_columns_scales() {
        let mut y = [2.0, 4.0];
        gemv_rows(1.0, &[], 0, &[], 0.5, &mut y);
        assert_eq!(y, [1.0, 2.0]);
    }
}
