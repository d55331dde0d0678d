//! Storage backends for [`SimpleCache`](crate::SimpleCache).
//!
//! Stores focus on key/value ownership and lookup semantics, while the cache
//! owns all locking. This keeps storage choices (strong map, weak-valued map,
//! caller-supplied container) independent of the concurrency discipline.

pub mod hashmap;
pub mod traits;
pub mod weak;

pub use hashmap::HashMapStore;
pub use traits::BackingStore;
pub use weak::WeakValueStore;
