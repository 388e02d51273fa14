//! Cache Entry Types
//!
//! Tier1 keeps typed values stamped with a monotonic insertion time. Tier2
//! keeps [`StoredRecord`]s: opaque serialized payloads stamped with wall-clock
//! time so they survive restarts.

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::WorkingSetKey;

/// In-process cache entry. Never mutated; a refresh is an overwrite.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Past `inserted_at + ttl`
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// Durable record layout: one per key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Working-set key the payload was derived from
    pub key: WorkingSetKey,
    /// Serialized derived dataset
    #[serde(with = "payload_text")]
    pub payload: Bytes,
    /// When the record was written
    pub inserted_at: DateTime<Utc>,
    /// Freshness window in milliseconds
    pub ttl_millis: u64,
}

impl StoredRecord {
    pub fn new(key: WorkingSetKey, payload: Bytes, ttl: Duration) -> Self {
        Self {
            key,
            payload,
            inserted_at: Utc::now(),
            ttl_millis: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Time since the record was written (zero if the clock went backwards)
    pub fn age(&self) -> Duration {
        (Utc::now() - self.inserted_at).to_std().unwrap_or_default()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis)
    }

    /// Past `inserted_at + ttl`
    pub fn is_expired(&self) -> bool {
        self.age() > self.ttl()
    }

    /// Expired for longer than `grace`, no longer usable even as a fallback
    pub fn is_past_grace(&self, grace: Duration) -> bool {
        self.age() > self.ttl().saturating_add(grace)
    }
}

/// Payloads are JSON documents themselves; store them inline as a string
/// rather than as an array of numbers.
mod payload_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(payload) {
            Ok(text) => s.serialize_str(text),
            Err(_) => Err(serde::ser::Error::custom("payload is not valid UTF-8")),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        Ok(Bytes::from(String::deserialize(d)?))
    }
}
