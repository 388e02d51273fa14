//! Cache Orchestrator - Unified Two-Tier Lookup
//!
//! Resolves a working-set key through Tier1 (in-process) and Tier2 (durable)
//! and falls back to a caller-supplied computation on a full miss.
//!
//! Concurrent misses for the same key are coalesced: the first caller leads
//! the computation, later callers await the same shared cell and observe its
//! outcome. If the leader is cancelled, a waiting caller takes over.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::key::WorkingSetKey;
use super::metrics::{CacheMetrics, LatencyTracker, MetricsSnapshot};
use super::tier1::{Tier1Cache, Tier1Config};
use super::tier2::{InMemoryTier2Backend, Tier2Backend, Tier2Cache, Tier2Config, Tier2Lookup};
use crate::error::{Error, Result};

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// In-process tier
    Tier1,
    /// Durable tier, promoted into Tier1
    Tier2,
    /// Computed by this caller
    Origin,
    /// Computed by another caller whose fetch this one joined
    Coalesced,
    /// Expired Tier2 record served because the fetch failed
    Stale,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Tier1 => write!(f, "tier1"),
            Source::Tier2 => write!(f, "tier2"),
            Source::Origin => write!(f, "origin"),
            Source::Coalesced => write!(f, "coalesced"),
            Source::Stale => write!(f, "stale"),
        }
    }
}

/// Resolution result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<V> {
    pub value: V,
    pub source: Source,
}

/// Values that can report whether they are only partially computed.
pub trait CachePayload {
    fn is_complete(&self) -> bool {
        true
    }
}

impl CachePayload for String {}
impl<T> CachePayload for Vec<T> {}
impl<K, T> CachePayload for BTreeMap<K, T> {}

/// What to do with a successful but partial result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialCachePolicy {
    /// Cache in both tiers like a complete result
    CacheAll,
    /// Cache in Tier1 only, so the gap is retried after the short TTL
    #[default]
    Tier1Only,
    /// Return it but cache nothing
    CompleteOnly,
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub tier1: Tier1Config,
    pub tier2: Tier2Config,
    /// Hard cap on a single computation
    pub resolve_timeout: Duration,
    pub partial_policy: PartialCachePolicy,
    /// Serve an expired Tier2 record when the computation fails
    pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tier1: Tier1Config::default(),
            tier2: Tier2Config::default(),
            resolve_timeout: Duration::from_secs(30),
            partial_policy: PartialCachePolicy::default(),
            serve_stale_on_error: true,
        }
    }
}

/// Outcome shared with every caller of a coalesced computation
type Shared<V> = std::result::Result<(V, Source), String>;

/// Two-tier cache with per-key request coalescing
pub struct CacheOrchestrator<V> {
    tier1: Tier1Cache<V>,
    tier2: Tier2Cache<V>,
    inflight: DashMap<WorkingSetKey, Arc<OnceCell<Shared<V>>>>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl<V> CacheOrchestrator<V>
where
    V: Serialize + DeserializeOwned + CachePayload + Clone + Send + Sync + 'static,
{
    pub fn new(backend: Arc<dyn Tier2Backend>) -> Self {
        Self::with_config(CacheConfig::default(), backend)
    }

    pub fn with_config(config: CacheConfig, backend: Arc<dyn Tier2Backend>) -> Self {
        Self {
            tier1: Tier1Cache::with_config(config.tier1.clone()),
            tier2: Tier2Cache::new(backend, config.tier2.clone()),
            inflight: DashMap::new(),
            config,
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// Create with in-memory Tier2 backend (for testing)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTier2Backend::new()))
    }

    /// Resolve `key`, running `compute` only when neither tier can answer and
    /// no other caller is already computing it.
    #[instrument(skip(self, key, compute), fields(key = %key.short()))]
    pub async fn resolve<F, Fut>(&self, key: &WorkingSetKey, compute: F) -> Result<Resolved<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.tier1.get(key) {
            self.metrics.record_tier1_hit();
            debug!("Tier1 hit");
            return Ok(Resolved {
                value,
                source: Source::Tier1,
            });
        }
        self.metrics.record_tier1_miss();

        let stale = match self.tier2.lookup(key).await {
            Ok(Tier2Lookup::Fresh(value)) => {
                self.metrics.record_tier2_hit();
                self.tier1.insert(key.clone(), value.clone());
                self.metrics.record_promotion();
                debug!("Tier2 hit, promoted to Tier1");
                return Ok(Resolved {
                    value,
                    source: Source::Tier2,
                });
            }
            Ok(Tier2Lookup::Stale(value)) => {
                self.metrics.record_tier2_miss();
                Some(value)
            }
            Ok(Tier2Lookup::Missing) => {
                self.metrics.record_tier2_miss();
                None
            }
            Err(e) => {
                self.metrics.record_tier2_error();
                warn!(error = %e, "Tier2 lookup failed, treating as miss");
                None
            }
        };

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let mut led = false;
        let mut leader_error = None;
        let (led_flag, error_slot) = (&mut led, &mut leader_error);
        let outcome = cell
            .get_or_init(move || {
                *led_flag = true;
                self.lead(key, compute, error_slot)
            })
            .await;

        if led {
            self.inflight.remove_if(key, |_, c| Arc::ptr_eq(c, &cell));
        } else {
            self.metrics.record_coalesced_wait();
            debug!("Joined in-flight fetch");
        }

        match outcome {
            Ok((value, source)) => Ok(Resolved {
                value: value.clone(),
                source: if led { *source } else { Source::Coalesced },
            }),
            Err(message) => {
                if self.config.serve_stale_on_error {
                    if let Some(value) = stale {
                        self.metrics.record_stale_served();
                        warn!(error = %message, "Serving stale Tier2 record after failed fetch");
                        return Ok(Resolved {
                            value,
                            source: Source::Stale,
                        });
                    }
                }

                match leader_error {
                    Some(e) => Err(e),
                    None => Err(Error::Coalesced(message.clone())),
                }
            }
        }
    }

    /// Body of a coalesced computation; runs at most once per in-flight cell
    async fn lead<F, Fut>(
        &self,
        key: &WorkingSetKey,
        compute: F,
        error_slot: &mut Option<Error>,
    ) -> Shared<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        // A leader that finished just before this cell was registered
        if let Some(value) = self.tier1.get(key) {
            return Ok((value, Source::Tier1));
        }

        let tracker = LatencyTracker::start();
        let timeout = self.config.resolve_timeout;
        let result = match tokio::time::timeout(timeout, compute()).await {
            Ok(result) => result,
            Err(_) => Err(Error::ResolveTimeout {
                key: key.to_string(),
                timeout,
            }),
        };

        match result {
            Ok(value) => {
                let elapsed = tracker.elapsed();
                self.metrics.record_origin_fetch(elapsed);
                info!(elapsed_ms = elapsed.as_millis() as u64, "Origin fetch complete");
                self.store(key, &value).await;
                Ok((value, Source::Origin))
            }
            Err(e) => {
                self.metrics.record_origin_failure();
                warn!(error = %e, "Origin fetch failed");
                let message = e.to_string();
                *error_slot = Some(e);
                Err(message)
            }
        }
    }

    /// Write a fresh result according to the partial-result policy
    async fn store(&self, key: &WorkingSetKey, value: &V) {
        let complete = value.is_complete();
        if !complete {
            self.metrics.record_partial_result();
        }

        let (to_tier1, to_tier2) = match (self.config.partial_policy, complete) {
            (_, true) | (PartialCachePolicy::CacheAll, false) => (true, true),
            (PartialCachePolicy::Tier1Only, false) => (true, false),
            (PartialCachePolicy::CompleteOnly, false) => (false, false),
        };

        if to_tier1 {
            self.tier1.insert(key.clone(), value.clone());
        }
        if to_tier2 {
            if let Err(e) = self.tier2.store(key, value).await {
                self.metrics.record_tier2_error();
                warn!(error = %e, "Tier2 write failed");
            }
        }
        debug!(complete, to_tier1, to_tier2, "Stored fetch result");
    }

    /// Drop a key from both tiers
    pub async fn invalidate(&self, key: &WorkingSetKey) -> Result<bool> {
        let in_tier1 = self.tier1.remove(key).is_some();
        let in_tier2 = self.tier2.delete(key).await?;
        Ok(in_tier1 || in_tier2)
    }

    /// Sweep expired Tier1 entries
    pub fn purge_expired(&self) -> usize {
        self.tier1.purge_expired()
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.tier1_entries = self.tier1.len() as u64;
        snapshot.tier1_evictions = self.tier1.evictions();
        snapshot
    }

    /// Number of keys with a computation in progress
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn tier1(&self) -> &Tier1Cache<V> {
        &self.tier1
    }

    pub fn tier2(&self) -> &Tier2Cache<V> {
        &self.tier2
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
