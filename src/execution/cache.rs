//! Compiled program caching.
//!
//! Compiling a WGSL module into a pipeline is far more expensive than a
//! draw call, and a chain re-rendered after every slider change reuses the
//! same handful of program variants. Compiled values are kept in an LRU
//! keyed by the program's variant key.

use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Default number of compiled programs kept alive.
pub const DEFAULT_CAPACITY: usize = 64;

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries evicted.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// LRU cache of compiled values keyed by program variant key.
pub struct ProgramCache<T> {
    cache: LruCache<String, T>,
    stats: CacheStats,
}

impl<T> ProgramCache<T> {
    /// Create a new cache with the given capacity (at least one entry).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: CacheStats::default(),
        }
    }

    /// Return the entry for `key`, building it with `build` on a miss.
    ///
    /// A failed build leaves the cache unchanged and is counted as a miss.
    pub fn get_or_try_insert<E, F>(&mut self, key: &str, build: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if self.cache.contains(key) {
            self.stats.hits += 1;
            debug!("Program cache hit: {}", key);
        } else {
            self.stats.misses += 1;
            debug!("Program cache miss: {}", key);
            if self.cache.len() == self.cache.cap().get() {
                self.stats.evictions += 1;
            }
        }
        self.cache.try_get_or_insert(key.to_string(), build)
    }

    /// Whether `key` is cached, without touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.peek(key).is_some()
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

impl<T> Default for ProgramCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
