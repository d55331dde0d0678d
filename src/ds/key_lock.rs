//! Transient per-key exclusive locks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  KeyLocks<K>:  DashMap<K, Arc<Mutex<()>>>                            │
//! │                                                                      │
//! │  lock(&k)                                                            │
//! │    1. entry(k).or_insert_with(new)   atomic insert-if-absent         │
//! │    2. clone the Arc, drop shard guard                                │
//! │    3. lock_arc()                     blocks while k is held          │
//! │    └─► KeyLockGuard                                                  │
//! │                                                                      │
//! │  drop(KeyLockGuard)                                                  │
//! │    1. unlock                                                         │
//! │    2. remove_if(k, ptr_eq(own lock)) deregister own instance only    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **On demand**: a key has a lock only while someone holds or waits on it.
//!   An idle registry is empty.
//! - **Shared instance**: callers racing on the same absent key all receive
//!   the same `Arc<Mutex<()>>` because creation goes through the map's entry
//!   API under its shard lock.
//! - **No shard lock while blocking**: the `Arc` is cloned out before
//!   `lock_arc`, so a waiter never stalls unrelated keys in the same shard.
//! - **Departing holder**: the holder deregisters on release even if other
//!   threads still wait on that instance. Those waiters proceed on the old
//!   instance one by one; a newcomer after deregistration creates a fresh
//!   instance. Deregistration is identity-checked, so a holder never removes
//!   a newer instance that some other thread created.
//!
//! ## Example Usage
//!
//! ```
//! use cachestore::ds::KeyLocks;
//!
//! let locks: KeyLocks<&str> = KeyLocks::new();
//! {
//!     let _guard = locks.lock(&"user:1");
//!     assert!(locks.contains(&"user:1"));
//! }
//! assert!(locks.is_empty());
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

type KeyMutex = Arc<Mutex<()>>;

/// Registry of per-key exclusive locks.
pub struct KeyLocks<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, KeyMutex>,
}

impl<K> KeyLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty registry with the default shard count.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Creates an empty registry with `shards` internal shards.
    ///
    /// # Panics
    ///
    /// Panics if `shards` is not a power of two greater than one. Use
    /// [`SimpleCacheBuilder`](crate::builder::SimpleCacheBuilder) for a
    /// validated constructor.
    pub fn with_shard_amount(shards: usize) -> Self {
        Self {
            locks: DashMap::with_shard_amount(shards),
        }
    }

    /// Acquires the exclusive lock for `key`, creating it if needed.
    ///
    /// Blocks while another guard for the same lock instance is alive.
    pub fn lock(&self, key: &K) -> KeyLockGuard<'_, K> {
        let lock = Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = lock.lock_arc();
        KeyLockGuard {
            registry: self,
            key: key.clone(),
            lock,
            guard: Some(guard),
        }
    }

    /// Returns `true` if a lock for `key` is currently registered.
    pub fn contains(&self, key: &K) -> bool {
        self.locks.contains_key(key)
    }

    /// Number of keys with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if no key has a registered lock.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K> Default for KeyLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyLocks<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLocks")
            .field("registered", &self.locks.len())
            .finish()
    }
}

/// Scoped ownership of one key's lock.
///
/// Dropping the guard unlocks and then deregisters the lock, on every exit
/// path including unwinding.
#[must_use = "the key lock is released as soon as the guard is dropped"]
pub struct KeyLockGuard<'a, K>
where
    K: Eq + Hash,
{
    registry: &'a KeyLocks<K>,
    key: K,
    lock: KeyMutex,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl<K> KeyLockGuard<'_, K>
where
    K: Eq + Hash,
{
    /// The key this guard serializes.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyLockGuard<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry
            .locks
            .remove_if(&self.key, |_, current| Arc::ptr_eq(current, &self.lock));
    }
}

impl<K> fmt::Debug for KeyLockGuard<'_, K>
where
    K: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockGuard")
            .field("key", &self.key)
            .finish()
    }
}
