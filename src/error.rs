//! Error types for the cachestore library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by fallible compute-if-absent calls when the
//!   caller-supplied producer fails.
//! - [`ConfigError`]: Returned when builder parameters are invalid
//!   (e.g. a key-lock shard count that is not a power of two).
//!
//! Absence of a key is never an error: lookups return `Option`.
//!
//! ## Example Usage
//!
//! ```
//! use cachestore::error::CacheError;
//! use cachestore::SimpleCache;
//!
//! let cache: SimpleCache<&str, u32> = SimpleCache::new();
//! let err = cache
//!     .try_get_or_insert_with("x", || "nope".parse::<u32>())
//!     .unwrap_err();
//! assert!(matches!(err, CacheError::Compute { .. }));
//! assert!(cache.get(&"x").is_none());
//! ```

use std::error::Error as StdError;

/// Boxed error produced by a compute-if-absent producer.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by cache operations that run caller code.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The producer passed to a compute-if-absent call failed.
    ///
    /// Nothing was stored for the key; a later call will invoke a producer again.
    #[error("failed to compute cache value: {source}")]
    Compute {
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    /// Wraps a producer failure.
    pub fn compute(source: impl Into<BoxError>) -> Self {
        Self::Compute {
            source: source.into(),
        }
    }

    /// Returns `true` if this is a producer failure.
    pub fn is_compute(&self) -> bool {
        matches!(self, Self::Compute { .. })
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by the [`SimpleCacheBuilder`](crate::builder::SimpleCacheBuilder)
/// `try_build*` methods. Carries a human-readable description of which parameter
/// failed validation.
///
/// # Example
///
/// ```
/// use cachestore::builder::SimpleCacheBuilder;
///
/// let err = SimpleCacheBuilder::new()
///     .key_lock_shards(3)
///     .try_build::<u64, u64>()
///     .unwrap_err();
/// assert!(err.to_string().contains("power of two"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
