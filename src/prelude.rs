pub use crate::builder::SimpleCacheBuilder;
pub use crate::ds::{KeyLockGuard, KeyLocks};
pub use crate::error::{BoxError, CacheError, ConfigError};
pub use crate::simple::{Entries, SimpleCache};
pub use crate::store::hashmap::HashMapStore;
pub use crate::store::traits::BackingStore;
pub use crate::store::weak::WeakValueStore;
