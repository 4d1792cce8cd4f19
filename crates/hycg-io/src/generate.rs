//! Random symmetric positive-definite test problems.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a random SPD matrix and right-hand side of the given size.
///
/// Off-diagonal entries are uniform in `[-1, 1)` and mirrored across the
/// diagonal. Each diagonal entry exceeds the absolute sum of its row's
/// off-diagonal entries by at least one, so the matrix is strictly
/// diagonally dominant with a positive diagonal and therefore SPD. The
/// right-hand side is uniform in `[-1, 1)`. The same seed always yields the
/// same problem.
pub fn generate_spd(size: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut matrix = Array2::<f64>::zeros((size, size));

    for i in 0..size {
        for j in (i + 1)..size {
            let v = rng.gen_range(-1.0..1.0);
            matrix[[i, j]] = v;
            matrix[[j, i]] = v;
        }
    }
    for i in 0..size {
        let off: f64 = (0..size)
            .filter(|&j| j != i)
            .map(|j| matrix[[i, j]].abs())
            .sum();
        matrix[[i, i]] = off + 1.0 + rng.gen_range(0.0..1.0);
    }

    let rhs = Array1::from_shape_fn(size, |_| rng.gen_range(-1.0..1.0));
    (matrix, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_matrix_is_symmetric_and_dominant() {
        let (matrix, rhs) = generate_spd(12, 7);
        assert_eq!(matrix.dim(), (12, 12));
        assert_eq!(rhs.len(), 12);
        for i in 0..12 {
            let mut off = 0.0;
            for j in 0..12 {
                assert_eq!(matrix[[i, j]], matrix[[j, i]]);
                if i != j {
                    off += matrix[[i, j]].abs();
                }
            }
            assert!(matrix[[i, i]] > off);
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        assert_eq!(generate_spd(5, 42), generate_spd(5, 42));
        assert_ne!(generate_spd(5, 42).1, generate_spd(5, 43).1);
    }

    #[test]
    fn test_empty_problem() {
        let (matrix, rhs) = generate_spd(0, 1);
        assert_eq!(matrix.dim(), (0, 0));
        assert!(rhs.is_empty());
    }
}
