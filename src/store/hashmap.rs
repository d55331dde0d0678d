//! HashMap-backed store with strong ownership of values.
//!
//! ## Architecture
//! - Entries live in a `HashMap<K, Arc<V>>` for O(1) lookup.
//! - No capacity bound and no eviction: an entry stays until it is
//!   overwritten, removed, or the store is cleared.
//!
//! ## Key Components
//! - `HashMapStore`: the default backing store of
//!   [`SimpleCache`](crate::SimpleCache).
//! - `Iter`: borrowing entry iterator handing out cloned `Arc<V>` handles.
//!
//! ## Example Usage
//! ```rust
//! use std::sync::Arc;
//!
//! use cachestore::store::hashmap::HashMapStore;
//! use cachestore::store::traits::BackingStore;
//!
//! let mut store: HashMapStore<u64, String> = HashMapStore::new();
//! store.insert(1, Arc::new("a".to_string()));
//! assert!(store.contains(&1));
//! ```
//!
//! ## Type Constraints
//! - `K: Eq + Hash` for key lookup.
//! - `S: BuildHasher` for custom hashers (defaults to `RandomState`).
//!
//! ## Thread Safety
//! - Not internally synchronized; the owning cache's `RwLock` guards it.
use std::collections::HashMap;
use std::collections::hash_map::{self, RandomState};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crate::store::traits::BackingStore;

/// HashMap-backed store that keeps every value alive.
pub struct HashMapStore<K, V, S = RandomState> {
    map: HashMap<K, Arc<V>, S>,
}

impl<K, V> HashMapStore<K, V, RandomState>
where
    K: Eq + Hash,
{
    /// Create an empty store with the default hasher.
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(0, RandomState::new())
    }

    /// Create a store pre-sized for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> HashMapStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Create a pre-sized store with a custom hasher.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, hasher),
        }
    }

    /// Return the backing hash map capacity.
    pub fn map_capacity(&self) -> usize {
        self.map.capacity()
    }
}

impl<K, V> Default for HashMapStore<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for HashMapStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapStore")
            .field("len", &self.map.len())
            .finish()
    }
}

impl<K, V, S> BackingStore<K, V> for HashMapStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Iter<'a>
        = Iter<'a, K, V>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.map.get(key).cloned()
    }

    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.map.insert(key, value)
    }

    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.map.remove(key)
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn iter(&self) -> Self::Iter<'_> {
        Iter {
            inner: self.map.iter(),
        }
    }
}

/// Entry iterator for [`HashMapStore`].
pub struct Iter<'a, K, V> {
    inner: hash_map::Iter<'a, K, Arc<V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, Arc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, value)| (key, Arc::clone(value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
