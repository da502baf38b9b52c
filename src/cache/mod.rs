//! Kernel row cache
//!
//! Coordinate descent touches one kernel row per update. Small cells keep
//! the full Gram matrix in memory; for cells whose dense Gram would blow
//! the memory budget, rows are computed on demand and kept in an LRU cache
//! bounded by that same budget.

use lru::LruCache;
use std::num::NonZeroUsize;

/// LRU cache of kernel rows, bounded by an approximate byte budget.
pub struct RowCache {
    cache: LruCache<usize, Vec<f64>>,
    hits: u64,
    misses: u64,
}

impl RowCache {
    /// Create a cache holding at most `capacity` rows.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache sized so that rows of `row_len` values stay within
    /// `memory_bytes`.
    pub fn with_memory_limit(memory_bytes: usize, row_len: usize) -> Self {
        let row_bytes = row_len.max(1) * std::mem::size_of::<f64>();
        Self::new((memory_bytes / row_bytes).max(1))
    }

    /// Fetch row `i`, computing and inserting it on a miss.
    pub fn row(&mut self, i: usize, compute: impl FnOnce() -> Vec<f64>) -> &[f64] {
        if self.cache.contains(&i) {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.cache.put(i, compute());
        }
        self.cache.get(&i).expect("row just inserted")
    }

    /// Fraction of row fetches served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Drop all cached rows and reset the counters.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
