//! Working-Set Identity
//!
//! A cache key derived from the membership of a working set. Identifiers are
//! sorted and de-duplicated before hashing, so enumeration order does not
//! matter, while adding or removing any identifier yields a different key.
//! This is the only invalidation mechanism the cache needs.
//!
//! The digest is SHA-256 so keys stay stable across processes and releases,
//! which the durable tier relies on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Item;
use crate::error::{Error, Result};

/// Domain separator mixed into every digest
const KEY_DOMAIN: &[u8] = b"shelfwise/working-set/v1";

/// Length of a hex-encoded SHA-256 digest
const KEY_HEX_LEN: usize = 64;

/// Hex-encoded SHA-256 of a sorted identifier set
///
/// Always 64 lowercase hex characters, which keeps it safe to slice for logs
/// and to use as a file name in the durable tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkingSetKey(String);

impl WorkingSetKey {
    /// Key for a set of identifiers, independent of order and duplicates
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sorted: Vec<S> = ids.into_iter().collect();
        sorted.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        sorted.dedup_by(|a, b| a.as_ref() == b.as_ref());

        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update((sorted.len() as u64).to_le_bytes());
        for id in &sorted {
            let bytes = id.as_ref().as_bytes();
            // Length prefix keeps ["ab", "c"] and ["a", "bc"] apart
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Key for the identifiers of a working set
    pub fn from_items(items: &[Item]) -> Self {
        Self::from_ids(items.iter().map(|item| item.id.as_str()))
    }

    /// Parse an already computed key (e.g. read back from storage)
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        let well_formed = hex.len() == KEY_HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(Error::InvalidKey(hex));
        }
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for WorkingSetKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(value)
    }
}

impl From<WorkingSetKey> for String {
    fn from(key: WorkingSetKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for WorkingSetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
