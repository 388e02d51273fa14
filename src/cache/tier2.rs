//! Tier2 Cache - Durable Tier
//!
//! Long-TTL tier that survives process restarts and caps the rate of origin
//! calls independently of how often Tier1 is cold.
//!
//! # Design
//!
//! - Pluggable backend ([`Tier2Backend`]): in-memory for tests, one JSON file
//!   per key for single-host deployments
//! - Payloads are stored opaque (serialized derived data, never raw items)
//! - Expired records are kept for a grace window so they can be served as a
//!   fallback when the origin is down; past the grace window a lookup deletes
//!   them

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::entry::StoredRecord;
use super::key::WorkingSetKey;
use crate::error::{Error, Result};

// =============================================================================
// Backend Port
// =============================================================================

/// Durable storage backend trait
#[async_trait]
pub trait Tier2Backend: Send + Sync {
    /// Read the record for a key
    async fn get(&self, key: &WorkingSetKey) -> Result<Option<StoredRecord>>;

    /// Write (or overwrite) a record
    async fn put(&self, record: StoredRecord) -> Result<()>;

    /// Delete the record for a key
    async fn delete(&self, key: &WorkingSetKey) -> Result<bool>;

    /// Backend statistics
    fn stats(&self) -> Tier2BackendStats;
}

/// Tier2 backend statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tier2BackendStats {
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

#[derive(Debug, Default)]
struct BackendCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl BackendCounters {
    fn snapshot(&self) -> Tier2BackendStats {
        Tier2BackendStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// In-memory backend for testing.
///
/// Can be switched into an unavailable state to exercise the
/// "store unreachable" path.
#[derive(Debug, Default)]
pub struct InMemoryTier2Backend {
    records: DashMap<WorkingSetKey, StoredRecord>,
    unavailable: AtomicBool,
    counters: BackendCounters,
}

impl InMemoryTier2Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going down (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(Error::Tier2Unavailable("in-memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Tier2Backend for InMemoryTier2Backend {
    async fn get(&self, key: &WorkingSetKey) -> Result<Option<StoredRecord>> {
        self.check_available()?;
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, record: StoredRecord) -> Result<()> {
        self.check_available()?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        self.records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete(&self, key: &WorkingSetKey) -> Result<bool> {
        self.check_available()?;
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.remove(key).is_some())
    }

    fn stats(&self) -> Tier2BackendStats {
        self.counters.snapshot()
    }
}

// =============================================================================
// File Backend
// =============================================================================

/// One JSON document per key in a directory.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// sees either the old record or the new one.
#[derive(Debug)]
pub struct FileTier2Backend {
    dir: PathBuf,
    write_seq: AtomicU64,
    counters: BackendCounters,
}

impl FileTier2Backend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_seq: AtomicU64::new(0),
            counters: BackendCounters::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &WorkingSetKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

fn unavailable(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Tier2Unavailable(format!("{} {}: {}", action, path.display(), e))
}

#[async_trait]
impl Tier2Backend for FileTier2Backend {
    async fn get(&self, key: &WorkingSetKey) -> Result<Option<StoredRecord>> {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(key);

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable("read", &path, e)),
        };

        let record: StoredRecord = serde_json::from_slice(&raw)?;
        Ok(Some(record))
    }

    async fn put(&self, record: StoredRecord) -> Result<()> {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| unavailable("create", &self.dir, e))?;

        let path = self.path_for(&record.key);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(
            "{}.json.tmp-{}-{}",
            record.key.as_str(),
            std::process::id(),
            seq
        ));

        let body = serde_json::to_vec(&record)?;
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| unavailable("write", &tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(unavailable("rename", &path, e));
        }

        Ok(())
    }

    async fn delete(&self, key: &WorkingSetKey) -> Result<bool> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable("delete", &path, e)),
        }
    }

    fn stats(&self) -> Tier2BackendStats {
        self.counters.snapshot()
    }
}

// =============================================================================
// Typed Tier2 Cache
// =============================================================================

/// Tier2 configuration
#[derive(Debug, Clone)]
pub struct Tier2Config {
    /// Freshness window of a record
    pub ttl: Duration,
    /// How long past expiry a record may still serve as a fallback
    pub stale_grace: Duration,
}

impl Default for Tier2Config {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(super::DEFAULT_TIER2_TTL_SECS),
            stale_grace: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Outcome of a Tier2 lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Tier2Lookup<V> {
    /// Within TTL
    Fresh(V),
    /// Expired but within the grace window
    Stale(V),
    /// Nothing usable
    Missing,
}

/// Typed view over a [`Tier2Backend`]
pub struct Tier2Cache<V> {
    backend: Arc<dyn Tier2Backend>,
    config: Tier2Config,
    _value: PhantomData<fn() -> V>,
}

impl<V> Tier2Cache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(backend: Arc<dyn Tier2Backend>, config: Tier2Config) -> Self {
        Self {
            backend,
            config,
            _value: PhantomData,
        }
    }

    /// In-memory backend (for testing)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTier2Backend::new()), Tier2Config::default())
    }

    /// Look up a key, classifying the record by age
    pub async fn lookup(&self, key: &WorkingSetKey) -> Result<Tier2Lookup<V>> {
        let record = match self.backend.get(key).await? {
            Some(record) => record,
            None => return Ok(Tier2Lookup::Missing),
        };

        if record.key != *key {
            warn!(key = %key.short(), stored = %record.key.short(), "Tier2 record key mismatch");
            return Ok(Tier2Lookup::Missing);
        }

        if record.is_past_grace(self.config.stale_grace) {
            debug!(key = %key.short(), "Dropping Tier2 record past grace window");
            if let Err(e) = self.backend.delete(key).await {
                warn!(key = %key.short(), error = %e, "Failed to delete Tier2 record");
            }
            return Ok(Tier2Lookup::Missing);
        }

        let value: V = serde_json::from_slice(&record.payload)?;
        if record.is_expired() {
            Ok(Tier2Lookup::Stale(value))
        } else {
            Ok(Tier2Lookup::Fresh(value))
        }
    }

    /// Serialize and write a value with a fresh timestamp
    pub async fn store(&self, key: &WorkingSetKey, value: &V) -> Result<()> {
        let payload = Bytes::from(serde_json::to_vec(value)?);
        let record = StoredRecord::new(key.clone(), payload, self.config.ttl);
        self.backend.put(record).await
    }

    pub async fn delete(&self, key: &WorkingSetKey) -> Result<bool> {
        self.backend.delete(key).await
    }

    pub fn backend(&self) -> &Arc<dyn Tier2Backend> {
        &self.backend
    }

    pub fn config(&self) -> &Tier2Config {
        &self.config
    }
}
