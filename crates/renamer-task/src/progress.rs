//! Byte-weighted progress accounting.

const MEGABYTE: u64 = 1024 * 1024;

/// Converts processed rows into a 0..=100 percentage.
///
/// Progress is measured in chunks of the session's total byte count. A chunk
/// is one byte, or one megabyte once the total no longer fits in an `i32`.
/// When no row reports a size, every row counts as one unit instead.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    row_chunks: Vec<u64>,
    chunk_size: u64,
    total_chunks: u64,
    completed_chunks: u64,
}

impl ProgressTracker {
    /// Tracker for rows of the given byte sizes, in processing order.
    #[must_use]
    pub fn new(row_sizes: &[u64]) -> Self {
        let total_bytes: u64 = row_sizes.iter().fold(0, |sum, size| sum.saturating_add(*size));
        let chunk_size = if total_bytes > u64::from(i32::MAX.unsigned_abs()) {
            MEGABYTE
        } else {
            1
        };
        let mut row_chunks: Vec<u64> = row_sizes
            .iter()
            .map(|size| size.div_ceil(chunk_size))
            .collect();
        if row_chunks.iter().all(|chunks| *chunks == 0) {
            row_chunks.iter_mut().for_each(|chunks| *chunks = 1);
        }
        let total_chunks = row_chunks.iter().sum();
        Self {
            row_chunks,
            chunk_size,
            total_chunks,
            completed_chunks: 0,
        }
    }

    /// Bytes per chunk.
    #[must_use]
    pub const fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunks the whole session accounts for.
    #[must_use]
    pub const fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Account for row `index` and return the new percentage.
    pub fn advance(&mut self, index: usize) -> u8 {
        let chunks = self.row_chunks.get(index).copied().unwrap_or_default();
        self.completed_chunks = self
            .completed_chunks
            .saturating_add(chunks)
            .min(self.total_chunks);
        self.percent()
    }

    /// Current percentage.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total_chunks == 0 {
            return 100;
        }
        let percent = u128::from(self.completed_chunks) * 100 / u128::from(self.total_chunks);
        u8::try_from(percent).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sessions_count_single_bytes() {
        let mut tracker = ProgressTracker::new(&[100, 300]);
        assert_eq!(tracker.chunk_size(), 1);
        assert_eq!(tracker.total_chunks(), 400);
        assert_eq!(tracker.advance(0), 25);
        assert_eq!(tracker.advance(1), 100);
    }

    #[test]
    fn large_sessions_count_megabytes() {
        let big = u64::from(i32::MAX.unsigned_abs()) + 1;
        let mut tracker = ProgressTracker::new(&[big, MEGABYTE]);
        assert_eq!(tracker.chunk_size(), MEGABYTE);
        assert_eq!(tracker.total_chunks(), big.div_ceil(MEGABYTE) + 1);
        let first = tracker.advance(0);
        assert!(first >= 99 && first < 100);
        assert_eq!(tracker.advance(1), 100);
    }

    #[test]
    fn unknown_sizes_fall_back_to_row_counts() {
        let mut tracker = ProgressTracker::new(&[0, 0, 0, 0]);
        assert_eq!(tracker.total_chunks(), 4);
        assert_eq!(tracker.advance(0), 25);
        assert_eq!(tracker.advance(1), 50);
    }

    #[test]
    fn percent_never_decreases_or_overflows() {
        let mut tracker = ProgressTracker::new(&[10, 0, 5]);
        let mut last = 0;
        for index in [0, 1, 2, 2, 9] {
            let percent = tracker.advance(index);
            assert!(percent >= last);
            assert!(percent <= 100);
            last = percent;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn empty_sessions_are_complete() {
        assert_eq!(ProgressTracker::new(&[]).percent(), 100);
    }
}
