//! Expiring key-value storage used by the limiter.

mod memory;
mod sweeper;

use std::time::Duration;

pub use memory::MemoryStore;
pub use sweeper::Sweeper;

/// A concurrent key-value store whose records carry a time-to-live.
///
/// Records whose TTL has elapsed must eventually become invisible to
/// [`get`](ExpiringStore::get) without any caller-driven cleanup. Implementations
/// must be safe to share between threads; callers never hold a lock across
/// a `get` followed by a `set`.
pub trait ExpiringStore<K, V>: Send + Sync {
    /// Fetch a copy of the live value for `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Store `value` under `key`, replacing any previous value and resetting its expiry.
    fn set(&self, key: K, value: V, ttl: Duration);

    /// Remove the record for `key` immediately.
    fn delete(&self, key: &K);
}
