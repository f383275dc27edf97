//! Block partitioning of a row domain across a fixed worker pool.
//!
//! Worker `id` of `workers` owns rows `[chunk * id, chunk * (id + 1))`
//! clipped to the domain, where `chunk = ceil(domain / workers)`. Trailing
//! workers may end up with an empty range; they still take part in every
//! barrier.

use std::ops::Range;

/// The rows one worker owns for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Worker index in `[0, workers)`.
    pub id: usize,
    /// Pool size.
    pub workers: usize,
    /// First owned row.
    pub start: usize,
    /// One past the last owned row.
    pub end: usize,
}

impl Partition {
    /// Compute worker `id`'s share of a `domain`-row domain.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    #[must_use]
    pub fn new(id: usize, workers: usize, domain: usize) -> Self {
        debug_assert!(id < workers, "worker {id} outside pool of {workers}");
        let chunk = domain.div_ceil(workers);
        let start = chunk.saturating_mul(id).min(domain);
        let end = chunk.saturating_mul(id + 1).min(domain);
        Self {
            id,
            workers,
            start,
            end,
        }
    }

    /// All partitions of `domain` for a pool of `workers`, in id order.
    pub fn all(workers: usize, domain: usize) -> impl Iterator<Item = Self> {
        (0..workers).map(move |id| Self::new(id, workers, domain))
    }

    /// Owned rows as a range.
    #[must_use]
    pub const fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of owned rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if this worker has nothing to do this phase.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}
