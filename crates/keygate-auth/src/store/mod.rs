//! TTL-indexed record stores.
//!
//! Grant flows keep authorization codes, access tokens, refresh tokens,
//! consent decisions and OAuth state behind the [`ResourceStore`] trait, one
//! store per namespace. The in-memory [`MemoryStore`] is the only
//! implementation shipped here; a persistent backend only needs to implement
//! the trait.
//!
//! # Expiry
//!
//! An entry written at `now` with `ttl` expires at `now + ttl` and is
//! unreadable from that instant on. Reads evict lazily, and every `put` runs
//! an opportunistic sweep so the store does not grow without bound.

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use time::OffsetDateTime;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not complete the operation.
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    /// The entry's expiry cannot be represented.
    #[error("ttl out of range for key '{0}'")]
    TtlOutOfRange(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for crate::AuthError {
    fn from(err: StoreError) -> Self {
        Self::storage(err.to_string())
    }
}

/// A keyed store with a per-entry absolute expiry.
///
/// Implementations must make every method atomic with respect to the others.
/// In particular [`update`](Self::update) is the check-and-set primitive used
/// to mark an authorization code as used exactly once.
pub trait ResourceStore<V>: Send + Sync {
    /// Inserts or replaces `key`, expiring `ttl` after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the expiry overflows.
    fn put(&self, key: &str, value: V, now: OffsetDateTime, ttl: Duration) -> StoreResult<()>;

    /// Reads `key`. An expired entry is evicted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get(&self, key: &str, now: OffsetDateTime) -> StoreResult<Option<V>>;

    /// Removes `key`. Returns whether an entry was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Applies `f` to a live entry in place and returns the entry as it was
    /// before `f` ran. Expired entries are evicted and `f` is not called.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn update(
        &self,
        key: &str,
        now: OffsetDateTime,
        f: &mut dyn FnMut(&mut V),
    ) -> StoreResult<Option<V>>;

    /// Removes every entry matching `predicate`, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove_where(&self, predicate: &mut dyn FnMut(&V) -> bool) -> StoreResult<usize>;

    /// Removes every entry expired at `now`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn sweep(&self, now: OffsetDateTime) -> StoreResult<usize>;

    /// Number of entries held, including expired ones not yet swept.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
