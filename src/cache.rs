//! Bounded memoization of removal results
//!
//! Results are keyed by a SHA-256 digest over the exact pixel buffer
//! (dimensions, colour type and bytes) and every matting parameter. The
//! cache holds at most `capacity` entries and evicts the least recently
//! used one when full. Only real cutouts are stored: fail-open passthroughs
//! are never memoized, so a manual retry reaches the model again.

use crate::{
    config::MattingParams,
    remover::{BackgroundRemover, RemovalOutcome, RemovalStatus},
};
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Digest identifying one (image, parameters) pair
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Compute the key for `image` processed with `params`
    #[must_use]
    pub fn new(image: &DynamicImage, params: &MattingParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(image.width().to_le_bytes());
        hasher.update(image.height().to_le_bytes());
        hasher.update(format!("{:?}", image.color()).as_bytes());
        hasher.update(image.as_bytes());
        hasher.update([
            u8::from(params.alpha_matting),
            params.foreground_threshold,
            params.background_threshold,
            params.erode_size,
        ]);
        Self(hasher.finalize().into())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey(")?;
        for byte in self.0.iter().take(6) {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit ratio as a percentage
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    image: Arc<DynamicImage>,
    last_used: u64,
}

/// Least-recently-used cache of processed images
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
    stats: CacheStats,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up a result, marking it as most recently used
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
        let now = self.tick();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = now;
            self.stats.hits += 1;
            Some(Arc::clone(&entry.image))
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Store a result, evicting the least recently used entry when full
    pub fn insert(&mut self, key: CacheKey, image: Arc<DynamicImage>) {
        let now = self.tick();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                image,
                last_used: now,
            },
        );
        self.stats.insertions += 1;
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            debug!(?key, "Evicted least recently used result");
        }
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Total pixel bytes held by cached results
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.entries
            .values()
            .map(|entry| entry.image.as_bytes().len() as u64)
            .sum()
    }

    /// Drop all entries, keeping statistics
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// [`BackgroundRemover`] with a bounded result cache in front
#[derive(Debug)]
pub struct CachedRemover {
    remover: BackgroundRemover,
    cache: Mutex<ResultCache>,
}

impl CachedRemover {
    #[must_use]
    pub fn new(remover: BackgroundRemover, capacity: usize) -> Self {
        Self {
            remover,
            cache: Mutex::new(ResultCache::new(capacity)),
        }
    }

    #[must_use]
    pub fn remover(&self) -> &BackgroundRemover {
        &self.remover
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, ResultCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the background, reusing an earlier identical result if cached
    pub fn remove(&self, image: &Arc<DynamicImage>, params: MattingParams) -> RemovalOutcome {
        let key = CacheKey::new(image, &params);

        if let Some(cached) = self.cache().get(&key) {
            debug!(?key, "Result cache hit");
            return RemovalOutcome {
                image: cached,
                status: RemovalStatus::Cached,
            };
        }

        // The lock is not held while the model runs
        let outcome = self.remover.remove(image, params);
        if outcome.status == RemovalStatus::Processed {
            self.cache().insert(key, Arc::clone(&outcome.image));
        }
        outcome
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache().stats()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.cache().size_bytes()
    }
}

/// Format a byte count in human-readable form
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}
