//! Backing store contract for [`SimpleCache`](crate::SimpleCache).
//!
//! Stores own key/value storage and lookup semantics only. Locking lives in
//! the cache: every method here runs while the cache holds either its shared
//! lock (`&self` methods) or its exclusive lock (`&mut self` methods), so
//! implementations need no interior synchronization of their own.
//!
//! Values travel as `Arc<V>`. A store may keep them strongly
//! ([`HashMapStore`](crate::store::hashmap::HashMapStore)) or weakly
//! ([`WeakValueStore`](crate::store::weak::WeakValueStore)); a weak store may
//! report a key absent even though nobody removed it.

use std::sync::Arc;

/// Key/value container the cache delegates storage to.
pub trait BackingStore<K, V> {
    /// Borrowing iterator over live entries.
    type Iter<'a>: Iterator<Item = (&'a K, Arc<V>)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Check if a key currently maps to a live value.
    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Check if the store holds no live entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite a value. Returns the previous live value.
    fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>>;

    /// Remove a value by key. Returns the removed live value.
    fn remove(&mut self, key: &K) -> Option<Arc<V>>;

    /// Remove all entries.
    fn clear(&mut self);

    /// Iterate live entries in container order.
    fn iter(&self) -> Self::Iter<'_>;
}
