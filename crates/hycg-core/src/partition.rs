//! Row ownership across the workers of a group.
//!
//! Block partition: with `local = size / W`, worker `w` owns
//! `[w * local, (w + 1) * local)` and the last worker additionally absorbs
//! the `size % W` remainder rows. Reduction and mat-vec share one
//! partition, so every row is computed by exactly one worker in both.

use std::ops::Range;

/// Contiguous block-row partition of `size` rows over `workers` workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    size: usize,
    workers: usize,
}

impl RowPartition {
    /// Partition `size` rows over `workers` workers (at least one).
    pub fn new(size: usize, workers: usize) -> Self {
        Self {
            size,
            workers: workers.max(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Rows per worker before the remainder is added to the last one.
    pub fn block_rows(&self) -> usize {
        self.size / self.workers
    }

    /// Rows owned by `rank`.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let local = self.block_rows();
        let start = rank * local;
        let end = if rank + 1 == self.workers {
            self.size
        } else {
            start + local
        };
        start..end
    }

    /// Number of rows owned by each worker, in rank order.
    pub fn counts(&self) -> Vec<usize> {
        (0..self.workers).map(|w| self.range(w).len()).collect()
    }

    /// First row of each worker, in rank order.
    pub fn displacements(&self) -> Vec<usize> {
        (0..self.workers).map(|w| self.range(w).start).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(size: usize, workers: usize) {
        let partition = RowPartition::new(size, workers);
        let mut owner = vec![None; size];
        for w in 0..workers {
            for row in partition.range(w) {
                assert!(owner[row].is_none(), "row {} owned twice", row);
                owner[row] = Some(w);
            }
        }
        assert!(owner.iter().all(Option::is_some), "gap for size={} W={}", size, workers);
        assert_eq!(partition.counts().iter().sum::<usize>(), size);
    }

    #[test]
    fn test_partition_covers_every_row_once() {
        for size in 0..40 {
            for workers in 1..=size.max(1) {
                assert_exact_cover(size, workers);
            }
        }
    }

    #[test]
    fn test_remainder_goes_to_last_worker() {
        let partition = RowPartition::new(10, 3);
        assert_eq!(partition.range(0), 0..3);
        assert_eq!(partition.range(1), 3..6);
        assert_eq!(partition.range(2), 6..10);
        assert_eq!(partition.counts(), vec![3, 3, 4]);
        assert_eq!(partition.displacements(), vec![0, 3, 6]);
    }

    #[test]
    fn test_more_workers_than_rows() {
        let partition = RowPartition::new(2, 4);
        assert_eq!(partition.counts(), vec![0, 0, 0, 2]);
        assert_exact_cover(2, 4);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let partition = RowPartition::new(5, 0);
        assert_eq!(partition.workers(), 1);
        assert_eq!(partition.range(0), 0..5);
    }
}
