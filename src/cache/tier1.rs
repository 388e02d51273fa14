//! Tier1 Cache - In-Process Volatile Tier
//!
//! Short-TTL cache answering repeated lookups within one session at zero I/O
//! cost.
//!
//! # Design
//!
//! - ShardedMap with per-shard locks, so unrelated keys never contend
//! - Lazy expiry: an expired entry is removed by the lookup that finds it
//! - Entry-count bound: expired entries go first, then the oldest insertions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use super::entry::CacheEntry;
use super::key::WorkingSetKey;
use super::shard::ShardedMap;

/// Tier1 configuration
#[derive(Debug, Clone)]
pub struct Tier1Config {
    /// Time to live for each entry
    pub ttl: Duration,
    /// Maximum number of entries
    pub max_entries: usize,
    /// Fraction of `max_entries` to shrink to when the bound is hit
    pub low_watermark: f64,
}

impl Default for Tier1Config {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(super::DEFAULT_TIER1_TTL_SECS),
            max_entries: 1024,
            low_watermark: 0.80,
        }
    }
}

/// Tier1 Cache - RAM-based volatile tier
pub struct Tier1Cache<V> {
    storage: ShardedMap<WorkingSetKey, CacheEntry<V>>,
    config: Tier1Config,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> Tier1Cache<V> {
    pub fn new() -> Self {
        Self::with_config(Tier1Config::default())
    }

    pub fn with_config(config: Tier1Config) -> Self {
        Self {
            storage: ShardedMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Get a live value, evicting it if expired
    pub fn get(&self, key: &WorkingSetKey) -> Option<V> {
        match self.storage.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.into_value())
            }
            Some(_) => {
                // Only drop it if nobody refreshed it in the meantime
                if self.storage.remove_if(key, CacheEntry::is_expired).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite with a fresh insertion time
    pub fn insert(&self, key: WorkingSetKey, value: V) {
        if self.storage.len() >= self.config.max_entries {
            self.evict();
        }
        self.storage
            .insert(key, CacheEntry::new(value, self.config.ttl));
    }

    pub fn remove(&self, key: &WorkingSetKey) -> Option<V> {
        self.storage.remove(key).map(CacheEntry::into_value)
    }

    pub fn contains(&self, key: &WorkingSetKey) -> bool {
        self.storage.contains_key(key)
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let removed = self.storage.retain(|_, entry| !entry.is_expired());
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Shrink to the low watermark: expired first, then oldest
    fn evict(&self) {
        let mut removed = self.purge_expired();

        let target = (self.config.max_entries as f64 * self.config.low_watermark) as usize;
        let len = self.storage.len();
        if len > target {
            let mut candidates: Vec<(WorkingSetKey, std::time::Instant)> = self
                .storage
                .entries()
                .into_iter()
                .map(|(k, e)| (k, e.inserted_at()))
                .collect();
            candidates.sort_by_key(|(_, inserted_at)| *inserted_at);

            for (key, _) in candidates.into_iter().take(len - target) {
                if self.storage.remove(&key).is_some() {
                    removed += 1;
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        debug!(removed, remaining = self.storage.len(), "Tier1 eviction pass");
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn clear(&self) {
        self.storage.clear();
    }
}

impl<V: Clone> Default for Tier1Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}
