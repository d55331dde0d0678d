//! # Simple Cache
//!
//! Thread-safe key-value store with two lock tiers: a container-wide
//! readers-writer lock around the backing store, and transient per-key locks
//! that serialize compute-if-absent for the same missing key.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────────┐
//!   │                          SimpleCache<K, V, S>                         │
//!   │                                                                       │
//!   │   store: RwLock<S>          S: BackingStore<K, V>                     │
//!   │   key_locks: KeyLocks<K>    key -> Arc<Mutex<()>> while computing     │
//!   └───────────────────────────────────────────────────────────────────────┘
//!
//!   get / contains_key / len    ──► store.read_recursive()
//!   entries / for_each          ──► store.read()
//!   put / remove / clear        ──► store.write()
//!
//!   get_or_insert_with(k, f)
//!     1. get(k)                 hit ──────────────────────────► return
//!     2. key_locks.lock(k)      blocks while k is being computed
//!     3. get(k)                 hit (populated while waiting) ─► return
//!     4. f()                    Err ──► CacheError::Compute, nothing stored
//!     5. put(k, v)              store.write(), independent of the key lock
//!     6. guard dropped          unlock + deregister on every exit path
//! ```
//!
//! ## Lock Domains
//!
//! The container lock and the per-key locks never nest in a cycle: a key lock
//! is held across one `get` and one `put`, each of which takes and releases the
//! container lock on its own, and no container-lock critical section ever waits
//! on a key lock. Computes on different keys run in parallel; computes on the
//! same key serialize; writes serialize against everything.
//!
//! Duplicate computation is bounded, not excluded: between the first read and
//! the key lock there is a window in which another thread can finish and
//! deregister, so a late arrival may create a fresh key lock and recompute.
//!
//! ## Iteration
//!
//! [`SimpleCache::entries`] exposes the backing store directly through a guard
//! holding the shared lock. Nothing is copied and no snapshot is taken. While a
//! guard is alive, writers on other threads block, and a write on the same
//! thread deadlocks. Drop the guard before mutating.
//!
//! Plain lookups (`get`, `contains_key`, `len`, `is_empty`) take the shared
//! lock recursively, so they never queue behind a waiting writer and are safe
//! to call while the same thread iterates. Opening a second `entries()` or
//! `for_each` on a thread that already iterates is not: with a writer queued
//! in between, the inner acquisition waits on the writer and the writer waits
//! on the outer guard.
//!
//! ## Example Usage
//!
//! ```
//! use cachestore::SimpleCache;
//!
//! let cache: SimpleCache<&str, u32> = SimpleCache::new();
//! cache.put("a", 1);
//! assert_eq!(cache.get(&"a").as_deref(), Some(&1));
//!
//! let b = cache.get_or_insert_with("b", || 2);
//! assert_eq!(*b, 2);
//!
//! assert_eq!(cache.remove(&"a").as_deref(), Some(&1));
//! cache.clear();
//! assert!(cache.is_empty());
//! ```
//!
//! ## Thread Safety
//!
//! `SimpleCache` is `Send + Sync` whenever the backing store and key type are;
//! share it behind an `Arc`.

use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, trace};

use crate::ds::KeyLocks;
use crate::error::{BoxError, CacheError};
use crate::store::hashmap::HashMapStore;
use crate::store::traits::BackingStore;
use crate::store::weak::WeakValueStore;

/// Thread-safe cache store over a pluggable backing container.
pub struct SimpleCache<K, V, S = HashMapStore<K, V>>
where
    K: Eq + Hash,
{
    store: RwLock<S>,
    key_locks: KeyLocks<K>,
    _values: PhantomData<fn() -> V>,
}

impl<K, V> SimpleCache<K, V, HashMapStore<K, V>>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache backed by a [`HashMapStore`].
    pub fn new() -> Self {
        Self::with_store(HashMapStore::new())
    }

    /// Creates an empty cache pre-sized for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_store(HashMapStore::with_capacity(capacity))
    }
}

impl<K, V> SimpleCache<K, V, WeakValueStore<K, V>>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache whose entries vanish once callers drop every
    /// `Arc<V>` handed out for them.
    pub fn weak() -> Self {
        Self::with_store(WeakValueStore::new())
    }
}

impl<K, V> Default for SimpleCache<K, V, HashMapStore<K, V>>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SimpleCache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BackingStore<K, V>,
{
    /// Creates a cache over a caller-supplied backing store.
    pub fn with_store(store: S) -> Self {
        Self::from_parts(store, KeyLocks::new())
    }

    pub(crate) fn from_parts(store: S, key_locks: KeyLocks<K>) -> Self {
        Self {
            store: RwLock::new(store),
            key_locks,
            _values: PhantomData,
        }
    }

    /// Looks up `key` under the shared lock.
    ///
    /// Never waits behind a queued writer, so it may be called while the same
    /// thread holds an [`Entries`] guard or runs inside [`for_each`](Self::for_each).
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.store.read_recursive().get(key)
    }

    /// Returns the value for `key`, computing and storing it if absent.
    ///
    /// Concurrent callers for the same missing key queue on a per-key lock;
    /// the first one runs `producer` and the rest observe its result through
    /// the double-check. Callers for other keys are not blocked.
    ///
    /// A panicking `producer` propagates; the key lock is still released and
    /// nothing is stored.
    ///
    /// # Deadlocks
    ///
    /// The per-key lock is not re-entrant. A `producer` that calls
    /// `get_or_insert_with` or [`try_get_or_insert_with`](Self::try_get_or_insert_with)
    /// for its own missing key blocks forever. It also must not call
    /// [`put`](Self::put), [`remove`](Self::remove) or [`clear`](Self::clear)
    /// while the calling thread holds an [`Entries`] guard.
    pub fn get_or_insert_with<F>(&self, key: K, producer: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        match self.compute_if_absent(key, || Ok::<V, Infallible>(producer())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible [`get_or_insert_with`](Self::get_or_insert_with).
    ///
    /// A producer error is returned as [`CacheError::Compute`]. The key stays
    /// absent and the error is not cached, so the next call runs a producer
    /// again.
    ///
    /// # Deadlocks
    ///
    /// Same as [`get_or_insert_with`](Self::get_or_insert_with): a `producer`
    /// that re-enters the compute path for its own missing key blocks forever,
    /// since the per-key lock is not re-entrant.
    ///
    /// ```
    /// use cachestore::SimpleCache;
    ///
    /// let cache: SimpleCache<&str, u64> = SimpleCache::new();
    /// assert!(cache.try_get_or_insert_with("x", || "bad".parse::<u64>()).is_err());
    /// assert!(cache.get(&"x").is_none());
    /// assert_eq!(*cache.try_get_or_insert_with("x", || "9".parse::<u64>()).unwrap(), 9);
    /// ```
    pub fn try_get_or_insert_with<F, E>(&self, key: K, producer: F) -> Result<Arc<V>, CacheError>
    where
        F: FnOnce() -> Result<V, E>,
        E: Into<BoxError>,
    {
        self.compute_if_absent(key, producer).map_err(|err| {
            let source = err.into();
            debug!(error = %source, "cache value producer failed");
            CacheError::Compute { source }
        })
    }

    fn compute_if_absent<F, E>(&self, key: K, producer: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let _key_lock = self.key_locks.lock(&key);
        if let Some(value) = self.get(&key) {
            trace!("value populated while waiting on key lock");
            return Ok(value);
        }

        trace!(in_flight = self.key_locks.len(), "computing missing value");
        let value = producer()?;
        Ok(self.put(key, value))
    }

    /// Inserts or overwrites `key` under the exclusive lock and returns the
    /// stored value.
    pub fn put(&self, key: K, value: V) -> Arc<V> {
        self.put_arc(key, Arc::new(value))
    }

    /// Like [`put`](Self::put) for a value that is already shared.
    pub fn put_arc(&self, key: K, value: Arc<V>) -> Arc<V> {
        self.store.write().insert(key, Arc::clone(&value));
        value
    }

    /// Removes `key` under the exclusive lock, returning the previous value.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.store.write().remove(key)
    }

    /// Removes every entry under the exclusive lock.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Returns `true` if `key` currently maps to a value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.store.read_recursive().contains(key)
    }

    /// Number of entries in the backing store.
    pub fn len(&self) -> usize {
        self.store.read_recursive().len()
    }

    /// Returns `true` if the backing store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.read_recursive().is_empty()
    }

    /// Number of keys with a compute-if-absent call in flight.
    pub fn in_flight(&self) -> usize {
        self.key_locks.len()
    }

    /// Live view over the backing store's entries.
    ///
    /// The returned guard holds the shared lock until dropped. Calling
    /// [`put`](Self::put), [`remove`](Self::remove), [`clear`](Self::clear) or
    /// a computing [`get_or_insert_with`](Self::get_or_insert_with) on the same
    /// thread while it is alive deadlocks, as does opening a nested
    /// `entries()` / [`for_each`](Self::for_each) once a writer is queued.
    /// [`get`](Self::get), [`contains_key`](Self::contains_key),
    /// [`len`](Self::len) and [`is_empty`](Self::is_empty) are safe.
    ///
    /// ```
    /// use cachestore::SimpleCache;
    ///
    /// let cache: SimpleCache<u32, u32> = SimpleCache::new();
    /// cache.put(1, 10);
    /// cache.put(2, 20);
    ///
    /// let entries = cache.entries();
    /// let total: u32 = entries.iter().map(|(_, v)| *v).sum();
    /// assert_eq!(total, 30);
    /// ```
    pub fn entries(&self) -> Entries<'_, K, V, S> {
        Entries {
            store: self.store.read(),
            _marker: PhantomData,
        }
    }

    /// Calls `f` for every entry while holding the shared lock.
    ///
    /// # Deadlocks
    ///
    /// `f` runs under the shared lock. Calling [`put`](Self::put),
    /// [`remove`](Self::remove), [`clear`](Self::clear), a computing
    /// [`get_or_insert_with`](Self::get_or_insert_with), or a nested
    /// `for_each` / [`entries`](Self::entries) from inside `f` deadlocks.
    /// Plain lookups such as [`get`](Self::get) are safe.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, Arc<V>),
    {
        let store = self.store.read();
        for (key, value) in store.iter() {
            f(key, value);
        }
    }
}

impl<K, V, S> fmt::Debug for SimpleCache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BackingStore<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleCache")
            .field("len", &self.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Read-locked view over a cache's backing store.
///
/// Iterate with [`Entries::iter`] or `for (k, v) in &entries`.
pub struct Entries<'a, K, V, S> {
    store: RwLockReadGuard<'a, S>,
    _marker: PhantomData<(fn() -> K, fn() -> V)>,
}

impl<K, V, S> Entries<'_, K, V, S>
where
    S: BackingStore<K, V>,
{
    /// Iterates live entries in container order.
    pub fn iter(&self) -> S::Iter<'_> {
        self.store.iter()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<'g, K, V, S> IntoIterator for &'g Entries<'_, K, V, S>
where
    S: BackingStore<K, V>,
    K: 'g,
    V: 'g,
{
    type Item = (&'g K, Arc<V>);
    type IntoIter = S::Iter<'g>;

    fn into_iter(self) -> Self::IntoIter {
        self.store.iter()
    }
}
