//! Two-Tier Cache
//!
//! Derived data keyed by working-set identity, served from an in-process
//! Tier1 and a durable Tier2, computed at most once per key at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Cache Orchestrator                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Tier1 (RAM)          │ Tier2 (Durable)      │ In-flight registry │
//! │  ┌────────────────┐   │ ┌────────────────┐   │ ┌────────────────┐ │
//! │  │ ShardedMap     │   │ │ Tier2Backend   │   │ │ DashMap<key,   │ │
//! │  │ (64-way)       │   │ │ memory / file  │   │ │  OnceCell>     │ │
//! │  │ TTL: minutes   │   │ │ TTL: ~a day    │   │ │                │ │
//! │  └────────────────┘   │ └────────────────┘   │ └────────────────┘ │
//! │         ▲                     │ promote              │            │
//! │         └─────────────────────┘            leader ──▶ origin      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Membership changes produce a new [`WorkingSetKey`], so there is no
//! explicit invalidation on the read path.

mod entry;
mod key;
mod metrics;
mod orchestrator;
mod shard;
mod tier1;
mod tier2;

pub use entry::{CacheEntry, StoredRecord};
pub use key::WorkingSetKey;
pub use metrics::{CacheMetrics, LatencyTracker, MetricsSnapshot};
pub use orchestrator::{
    CacheConfig, CacheOrchestrator, CachePayload, PartialCachePolicy, Resolved, Source,
};
pub use shard::ShardedMap;
pub use tier1::{Tier1Cache, Tier1Config};
pub use tier2::{
    FileTier2Backend, InMemoryTier2Backend, Tier2Backend, Tier2BackendStats, Tier2Cache,
    Tier2Config, Tier2Lookup,
};

/// Default Tier1 TTL (5 minutes)
pub const DEFAULT_TIER1_TTL_SECS: u64 = 5 * 60;

/// Default Tier2 TTL (1 day)
pub const DEFAULT_TIER2_TTL_SECS: u64 = 24 * 60 * 60;

// =============================================================================
// Tests
// =============================================================================
