//! Builder for [`SimpleCache`] instances.
//!
//! Collects sizing parameters, validates them, and picks the backing store.
//!
//! ## Example
//!
//! ```rust
//! use cachestore::builder::SimpleCacheBuilder;
//!
//! let cache = SimpleCacheBuilder::new()
//!     .initial_capacity(1_024)
//!     .key_lock_shards(16)
//!     .build::<u64, String>();
//! cache.put(1, "hello".to_string());
//! assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("hello"));
//! ```

use std::hash::Hash;

use crate::ds::KeyLocks;
use crate::error::ConfigError;
use crate::simple::SimpleCache;
use crate::store::hashmap::HashMapStore;
use crate::store::traits::BackingStore;
use crate::store::weak::WeakValueStore;

/// Builder for creating cache instances.
#[derive(Debug, Clone, Default)]
pub struct SimpleCacheBuilder {
    initial_capacity: usize,
    key_lock_shards: Option<usize>,
}

impl SimpleCacheBuilder {
    /// Create a builder with no pre-sizing and default key-lock sharding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the backing store for `capacity` entries.
    ///
    /// Ignored by [`build_with_store`](Self::build_with_store).
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Number of shards in the per-key lock registry.
    ///
    /// Must be a power of two greater than one.
    pub fn key_lock_shards(mut self, shards: usize) -> Self {
        self.key_lock_shards = Some(shards);
        self
    }

    /// Build a cache over a strong [`HashMapStore`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. See [`try_build`](Self::try_build).
    pub fn build<K, V>(self) -> SimpleCache<K, V>
    where
        K: Eq + Hash + Clone,
    {
        match self.try_build() {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Build a cache over a strong [`HashMapStore`], returning an error on
    /// invalid configuration instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `key_lock_shards` is not a power of two
    /// greater than one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cachestore::builder::SimpleCacheBuilder;
    ///
    /// assert!(SimpleCacheBuilder::new().key_lock_shards(8).try_build::<u32, u32>().is_ok());
    /// assert!(SimpleCacheBuilder::new().key_lock_shards(6).try_build::<u32, u32>().is_err());
    /// ```
    pub fn try_build<K, V>(self) -> Result<SimpleCache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone,
    {
        let store = HashMapStore::with_capacity(self.initial_capacity);
        self.try_build_with_store(store)
    }

    /// Build a cache over a [`WeakValueStore`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. See [`try_build_weak`](Self::try_build_weak).
    pub fn build_weak<K, V>(self) -> SimpleCache<K, V, WeakValueStore<K, V>>
    where
        K: Eq + Hash + Clone,
    {
        match self.try_build_weak() {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Build a cache over a [`WeakValueStore`], returning an error on invalid
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as [`try_build`](Self::try_build).
    pub fn try_build_weak<K, V>(
        self,
    ) -> Result<SimpleCache<K, V, WeakValueStore<K, V>>, ConfigError>
    where
        K: Eq + Hash + Clone,
    {
        let store = WeakValueStore::with_capacity(self.initial_capacity);
        self.try_build_with_store(store)
    }

    /// Build a cache over a caller-supplied backing store.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    /// See [`try_build_with_store`](Self::try_build_with_store).
    pub fn build_with_store<K, V, S>(self, store: S) -> SimpleCache<K, V, S>
    where
        K: Eq + Hash + Clone,
        S: BackingStore<K, V>,
    {
        match self.try_build_with_store(store) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Build a cache over a caller-supplied backing store, returning an error
    /// on invalid configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as [`try_build`](Self::try_build).
    pub fn try_build_with_store<K, V, S>(
        self,
        store: S,
    ) -> Result<SimpleCache<K, V, S>, ConfigError>
    where
        K: Eq + Hash + Clone,
        S: BackingStore<K, V>,
    {
        let key_locks = self.key_locks()?;
        Ok(SimpleCache::from_parts(store, key_locks))
    }

    fn key_locks<K>(&self) -> Result<KeyLocks<K>, ConfigError>
    where
        K: Eq + Hash + Clone,
    {
        match self.key_lock_shards {
            None => Ok(KeyLocks::new()),
            Some(shards) if shards > 1 && shards.is_power_of_two() => {
                Ok(KeyLocks::with_shard_amount(shards))
            },
            Some(shards) => Err(ConfigError::new(format!(
                "key_lock_shards must be a power of two greater than 1, got {shards}"
            ))),
        }
    }
}
