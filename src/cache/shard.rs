//! Sharded Map Implementation
//!
//! Concurrent hashmap split into independently locked shards, so that
//! operations on unrelated keys rarely contend.
//!
//! # Design
//!
//! - Each shard has its own `parking_lot::RwLock`
//! - Power-of-2 shard count enables fast modulo via bitwise AND
//! - A key always maps to the same shard for the life of the map

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Single shard containing a hashmap
pub struct Shard<K, V> {
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for Shard<K, V> {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V> Shard<K, V> {
    fn len(&self) -> usize {
        self.map.read().len()
    }
}

/// Sharded map with configurable shard count
pub struct ShardedMap<K, V, const N: usize = 64> {
    shards: Box<[Shard<K, V>]>,
    hasher: std::collections::hash_map::RandomState,
}

impl<K: Eq + Hash, V, const N: usize> Default for ShardedMap<K, V, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V, const N: usize> ShardedMap<K, V, N> {
    /// Create a new sharded map
    pub fn new() -> Self {
        assert!(N.is_power_of_two(), "shard count must be a power of two");
        let shards: Vec<Shard<K, V>> = (0..N).map(|_| Shard::default()).collect();
        Self {
            shards: shards.into_boxed_slice(),
            hasher: Default::default(),
        }
    }

    /// Get the shard count
    #[inline]
    pub const fn shard_count(&self) -> usize {
        N
    }

    #[inline]
    fn shard_for(&self, key: &K) -> &Shard<K, V> {
        let idx = (self.hasher.hash_one(key) as usize) & (N - 1);
        &self.shards[idx]
    }

    /// Get a copy of a value
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard_for(key).map.read().get(key).cloned()
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &K) -> bool {
        self.shard_for(key).map.read().contains_key(key)
    }

    /// Insert a value, returning the old value if present
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.shard_for(&key).map.write().insert(key, value)
    }

    /// Remove a value, returning it if present
    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard_for(key).map.write().remove(key)
    }

    /// Remove a value only if the predicate holds, checked under the shard lock
    pub fn remove_if<F>(&self, key: &K, predicate: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut guard = self.shard_for(key).map.write();
        if guard.get(key).is_some_and(predicate) {
            guard.remove(key)
        } else {
            None
        }
    }

    /// Keep only entries for which the predicate holds; returns removed count
    pub fn retain<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut guard = shard.map.write();
            let before = guard.len();
            guard.retain(|k, v| predicate(k, v));
            removed += before - guard.len();
        }
        removed
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.shards
            .iter()
            .flat_map(|shard| {
                let guard = shard.map.read();
                guard
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Total number of entries across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all shards
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.map.write().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_get_remove() {
        let map: ShardedMap<String, u32, 8> = ShardedMap::new();
        assert_eq!(map.shard_count(), 8);

        assert!(map.insert("a".into(), 1).is_none());
        assert_eq!(map.insert("a".into(), 2), Some(1));
        assert_eq!(map.get(&"a".to_string()), Some(2));
        assert!(map.contains_key(&"a".to_string()));

        assert_eq!(map.remove(&"a".to_string()), Some(2));
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_if() {
        let map: ShardedMap<u32, u32, 4> = ShardedMap::new();
        map.insert(1, 10);

        assert!(map.remove_if(&1, |v| *v == 11).is_none());
        assert_eq!(map.remove_if(&1, |v| *v == 10), Some(10));
        assert!(map.remove_if(&2, |_| true).is_none());
    }

    #[test]
    fn test_retain_counts_removed() {
        let map: ShardedMap<u32, u32, 16> = ShardedMap::new();
        for i in 0..100 {
            map.insert(i, i);
        }

        let removed = map.retain(|_, v| v % 2 == 0);
        assert_eq!(removed, 50);
        assert_eq!(map.len(), 50);
        assert_eq!(map.entries().len(), 50);

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_concurrent_inserts() {
        let map: Arc<ShardedMap<u32, u32>> = Arc::new(ShardedMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = map.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        map.insert(t * 1000 + i, i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 2000);
    }
}
