//! In-memory result cache for burst analyses
//!
//! Dashboard views re-issue identical queries whenever a control is touched,
//! so finished analyses are cached in a [`moka`] cache:
//! - Keys are the SHA-256 of the serialized, normalized [`BurstQuery`]
//! - Entries expire after a TTL (default: 1 hour)
//! - Capacity is bounded by `max_entries`
//!
//! # Example
//!
//! ```rust,ignore
//! use cogwar::cache::ResultCache;
//!
//! let cache = ResultCache::new(&config.cache);
//! let analysis = cache.get_or_compute(&query, || run_query(repo, &detector, &query))?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::analytics::{BurstAnalysis, BurstQuery};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics;

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Entries currently held
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL cache of finished analyses
pub struct ResultCache {
    inner: Cache<String, Arc<BurstAnalysis>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache from configuration
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_entries as u64)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();

        Self {
            inner,
            enabled: config.enabled && config.max_entries > 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache that never stores anything
    pub fn disabled() -> Self {
        Self::new(&CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Check if caching is active
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Hash a query for use as cache key
    ///
    /// Filters are normalized first, so the order of selected values does
    /// not matter.
    pub fn key_for(query: &BurstQuery) -> Result<String> {
        let normalized = BurstQuery {
            filters: query.filters.clone().normalized(),
            ..query.clone()
        };
        let bytes = serde_json::to_vec(&normalized)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Get a cached analysis for `query`
    pub fn get(&self, query: &BurstQuery) -> Result<Option<Arc<BurstAnalysis>>> {
        if !self.enabled {
            return Ok(None);
        }

        let key = Self::key_for(query)?;
        let found = self.inner.get(&key);

        let hit = found.is_some();
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_cache_lookup(hit);
        tracing::debug!(key = %key, hit, "Result cache lookup");

        Ok(found)
    }

    /// Store an analysis, returning the shared handle
    pub fn insert(&self, query: &BurstQuery, analysis: BurstAnalysis) -> Result<Arc<BurstAnalysis>> {
        let analysis = Arc::new(analysis);
        if !self.enabled {
            return Ok(analysis);
        }

        let key = Self::key_for(query)?;
        self.inner.insert(key, Arc::clone(&analysis));
        metrics::update_cache_entries(self.inner.entry_count() as usize);

        Ok(analysis)
    }

    /// Get a cached analysis or compute and cache it
    pub fn get_or_compute<F>(&self, query: &BurstQuery, compute: F) -> Result<Arc<BurstAnalysis>>
    where
        F: FnOnce() -> Result<BurstAnalysis>,
    {
        if let Some(cached) = self.get(query)? {
            return Ok(cached);
        }

        let analysis = compute()?;
        self.insert(query, analysis)
    }

    /// Number of live entries
    ///
    /// Flushes pending evictions first, so expired entries are not counted.
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
        metrics::update_cache_entries(0);
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
