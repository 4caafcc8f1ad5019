//! Concurrent storage backing the tracker registry.
//!
//! Provides sharded key-value storage for registries of shared handles.

use crate::application::ports::Storage;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;

/// Thread-safe sharded storage backed by DashMap.
///
/// DashMap provides lock-free reads and fine-grained locking for writes.
/// Creation races are settled under the entry's shard lock, so a factory
/// passed to [`Storage::get_or_try_insert`] runs at most once per key.
#[derive(Debug)]
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, V>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a new sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Insert or update a value.
    pub fn insert(&self, key: K, value: V) {
        self.map.insert(key, value);
    }

    /// Check if a key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.map.clear();
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// Implement the Storage port
impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync + std::fmt::Debug,
{
    fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn get_or_try_insert<E, F>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        // The vacant entry holds its shard's write lock across the factory
        // call, so concurrent callers for the same key serialize here and
        // only the first runs the factory.
        match self.map.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let value = factory()?;
                entry.insert(value.clone());
                Ok(value)
            }
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.map.remove(key).map(|(_, value)| value)
    }

    fn drain(&self) -> Vec<(K, V)> {
        let keys: Vec<K> = self.map.iter().map(|entry| entry.key().clone()).collect();
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(pair) = self.map.remove(&key) {
                removed.push(pair);
            }
        }
        removed
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.map.iter() {
            f(entry.key(), entry.value());
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// Implement Storage for Arc<ShardedStorage> to allow it to be shared directly
impl<K, V> Storage<K, V> for std::sync::Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync + std::fmt::Debug,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn get_or_try_insert<E, F>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        (**self).get_or_try_insert(key, factory)
    }

    fn remove(&self, key: &K) -> Option<V> {
        (**self).remove(key)
    }

    fn drain(&self) -> Vec<(K, V)> {
        (**self).drain()
    }

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        (**self).for_each(f)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }
}
