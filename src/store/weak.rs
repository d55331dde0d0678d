//! Weak-valued store whose entries can be reclaimed.
//!
//! ## Architecture
//!
//! ```text
//!   HashMap<K, Weak<V>>
//!
//!   cache.put(k, v) ──► Arc<V> returned to caller ──┐
//!                       Weak<V> kept in the map ◄───┘ (downgrade)
//!
//!   last Arc<V> dropped ──► entry is dead: get() = None, iter() skips it
//!   insert() past watermark ──► retain(live) purges dead slots
//! ```
//!
//! The store never keeps a value alive by itself. Whoever holds the `Arc<V>`
//! returned from `put` / `get_or_insert_with` keeps the entry present; once
//! the last strong handle drops the key reads as absent even though nobody
//! removed it. This is the reclamation-friendly container for callers that
//! layer their own ownership on top of the cache.
//!
//! Dead slots are purged lazily on insert once the table has grown past a
//! watermark (twice the live count after the previous purge), keeping
//! purge cost amortized O(1) per insert.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cachestore::store::traits::BackingStore;
//! use cachestore::store::weak::WeakValueStore;
//!
//! let mut store: WeakValueStore<&str, u32> = WeakValueStore::new();
//! let handle = Arc::new(7);
//! store.insert("k", handle.clone());
//! assert_eq!(store.get(&"k").as_deref(), Some(&7));
//!
//! drop(handle);
//! assert!(store.get(&"k").is_none());
//! ```
use std::collections::HashMap;
use std::collections::hash_map::{self, RandomState};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::store::traits::BackingStore;

/// Smallest table size that triggers a purge of dead entries.
const MIN_PURGE_WATERMARK: usize = 32;

/// Store holding `Weak<V>` so unreferenced values are reclaimed.
pub struct WeakValueStore<K, V, S = RandomState> {
    map: HashMap<K, Weak<V>, S>,
    purge_watermark: usize,
}

impl<K, V> WeakValueStore<K, V, RandomState>
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

impl<K, V, S> WeakValueStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Create a pre-sized store with a custom hasher.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, hasher),
            purge_watermark: capacity.max(MIN_PURGE_WATERMARK),
        }
    }

    /// Number of slots in the table, dead ones included.
    pub fn slot_count(&self) -> usize {
        self.map.len()
    }

    /// Drop every slot whose value has been reclaimed. Returns how many were removed.
    pub fn purge(&mut self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, value| value.strong_count() > 0);
        let purged = before - self.map.len();
        self.purge_watermark = (self.map.len() * 2).max(MIN_PURGE_WATERMARK);
        if purged > 0 {
            trace!(purged, live = self.map.len(), "purged reclaimed entries");
        }
        purged
    }
}

impl<K, V> Default for WeakValueStore<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for WeakValueStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakValueStore")
            .field("slots", &self.map.len())
            .field("purge_watermark", &self.purge_watermark)
            .finish()
    }
}

impl<K, V, S> BackingStore<K, V> for WeakValueStore<K, V, S>
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
        self.map.get(key).and_then(Weak::upgrade)
    }

    fn contains(&self, key: &K) -> bool {
        self.map
            .get(key)
            .is_some_and(|value| value.strong_count() > 0)
    }

    fn len(&self) -> usize {
        self.map
            .values()
            .filter(|value| value.strong_count() > 0)
            .count()
    }

    fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        if self.map.len() >= self.purge_watermark {
            self.purge();
        }
        self.map
            .insert(key, Arc::downgrade(&value))
            .and_then(|previous| previous.upgrade())
    }

    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.map.remove(key).and_then(|value| value.upgrade())
    }

    fn clear(&mut self) {
        self.map.clear();
        self.purge_watermark = MIN_PURGE_WATERMARK;
    }

    fn iter(&self) -> Self::Iter<'_> {
        Iter {
            inner: self.map.iter(),
        }
    }
}

/// Entry iterator for [`WeakValueStore`]; skips reclaimed values.
pub struct Iter<'a, K, V> {
    inner: hash_map::Iter<'a, K, Weak<V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, Arc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .find_map(|(key, value)| value.upgrade().map(|value| (key, value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}
