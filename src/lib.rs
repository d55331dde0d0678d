//! cachestore: a thread-safe key-value cache store with per-key
//! compute-if-absent locking.
//!
//! [`SimpleCache`] guards a pluggable [`BackingStore`](store::BackingStore)
//! with a container-wide readers-writer lock and serializes concurrent
//! computation of the same missing key through transient per-key locks.
//! It is meant as the storage layer beneath caches that add expiration or
//! eviction on top.

pub mod builder;
pub mod ds;
pub mod error;
pub mod prelude;
pub mod simple;
pub mod store;

pub use error::{CacheError, ConfigError};
pub use simple::{Entries, SimpleCache};
