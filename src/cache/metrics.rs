//! Cache Metrics Collection
//!
//! Counters for monitoring how lookups are being answered, plus export in
//! Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Error, Result};

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Tier1
    tier1_hits: AtomicU64,
    tier1_misses: AtomicU64,

    // Tier2
    tier2_hits: AtomicU64,
    tier2_misses: AtomicU64,
    tier2_errors: AtomicU64,
    promotions: AtomicU64,

    // Origin
    origin_fetches: AtomicU64,
    origin_failures: AtomicU64,
    partial_results: AtomicU64,
    coalesced_waits: AtomicU64,
    stale_served: AtomicU64,

    // Origin latency (microseconds, exponential moving average)
    origin_latency_us: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tier1_hit(&self) {
        self.tier1_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier1_miss(&self) {
        self.tier1_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier2_hit(&self) {
        self.tier2_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier2_miss(&self) {
        self.tier2_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier2_error(&self) {
        self.tier2_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_fetch(&self, duration: Duration) {
        self.origin_fetches.fetch_add(1, Ordering::Relaxed);
        self.update_latency_ema(&self.origin_latency_us, duration);
    }

    pub fn record_origin_failure(&self) {
        self.origin_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial_result(&self) {
        self.partial_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tier1_hits(&self) -> u64 {
        self.tier1_hits.load(Ordering::Relaxed)
    }

    pub fn tier2_hits(&self) -> u64 {
        self.tier2_hits.load(Ordering::Relaxed)
    }

    pub fn origin_fetches(&self) -> u64 {
        self.origin_fetches.load(Ordering::Relaxed)
    }

    fn update_latency_ema(&self, target: &AtomicU64, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1;

        loop {
            let current = target.load(Ordering::Relaxed);
            let updated = if current == 0 {
                new_us
            } else {
                ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
            };

            if target
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn origin_latency(&self) -> Duration {
        Duration::from_micros(self.origin_latency_us.load(Ordering::Relaxed))
    }

    /// Share of lookups answered by either tier without an origin fetch
    pub fn hit_ratio(&self) -> f64 {
        let hits = (self.tier1_hits() + self.tier2_hits()) as f64;
        let total = hits + self.origin_fetches() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tier1_hits: self.tier1_hits(),
            tier1_misses: self.tier1_misses.load(Ordering::Relaxed),
            tier2_hits: self.tier2_hits(),
            tier2_misses: self.tier2_misses.load(Ordering::Relaxed),
            tier2_errors: self.tier2_errors.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            origin_fetches: self.origin_fetches(),
            origin_failures: self.origin_failures.load(Ordering::Relaxed),
            partial_results: self.partial_results.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            tier1_entries: 0,
            tier1_evictions: 0,
            origin_latency_us: self.origin_latency().as_micros() as u64,
            hit_ratio: self.hit_ratio(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.tier1_hits,
            &self.tier1_misses,
            &self.tier2_hits,
            &self.tier2_misses,
            &self.tier2_errors,
            &self.promotions,
            &self.origin_fetches,
            &self.origin_failures,
            &self.partial_results,
            &self.coalesced_waits,
            &self.stale_served,
            &self.origin_latency_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub tier1_hits: u64,
    pub tier1_misses: u64,
    pub tier2_hits: u64,
    pub tier2_misses: u64,
    pub tier2_errors: u64,
    pub promotions: u64,
    pub origin_fetches: u64,
    pub origin_failures: u64,
    pub partial_results: u64,
    pub coalesced_waits: u64,
    pub stale_served: u64,
    /// Filled in by the orchestrator from the live Tier1
    pub tier1_entries: u64,
    pub tier1_evictions: u64,
    pub origin_latency_us: u64,
    pub hit_ratio: f64,
}

impl MetricsSnapshot {
    /// Render in the Prometheus text exposition format
    pub fn to_prometheus(&self) -> Result<String> {
        let registry = Registry::new_custom(Some("shelfwise_cache".to_string()), None)
            .map_err(|e| Error::Internal(e.to_string()))?;

        let gauges: [(&str, &str, u64); 14] = [
            ("tier1_hits", "Lookups answered by Tier1", self.tier1_hits),
            ("tier1_misses", "Lookups that missed Tier1", self.tier1_misses),
            ("tier2_hits", "Lookups answered by Tier2", self.tier2_hits),
            ("tier2_misses", "Lookups that missed Tier2", self.tier2_misses),
            ("tier2_errors", "Tier2 reads or writes that failed", self.tier2_errors),
            ("promotions", "Tier2 records promoted into Tier1", self.promotions),
            ("origin_fetches", "Origin fetches performed", self.origin_fetches),
            ("origin_failures", "Origin fetches that failed", self.origin_failures),
            ("partial_results", "Origin fetches with failed facets", self.partial_results),
            ("coalesced_waits", "Callers that joined an in-flight fetch", self.coalesced_waits),
            ("stale_served", "Expired Tier2 records served after a failure", self.stale_served),
            ("tier1_entries", "Entries currently in Tier1", self.tier1_entries),
            ("tier1_evictions", "Entries evicted from Tier1", self.tier1_evictions),
            ("origin_latency_us", "Smoothed origin fetch latency in microseconds", self.origin_latency_us),
        ];

        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(Opts::new(name, help))
                .map_err(|e| Error::Internal(e.to_string()))?;
            gauge.set(value as i64);
            registry
                .register(Box::new(gauge))
                .map_err(|e| Error::Internal(e.to_string()))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Latency tracker helper
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// =============================================================================
// Tests
// =============================================================================
