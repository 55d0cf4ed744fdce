//! In-process expiring store built on a sharded concurrent map.

use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use super::ExpiringStore;

/// A stored value and the instant after which it is no longer visible.
#[derive(Debug)]
struct Record<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> Record<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// An in-memory [`ExpiringStore`].
///
/// Expired records are hidden from `get` as soon as their TTL elapses and are
/// physically removed either on that `get` or by [`sweep`](MemoryStore::sweep),
/// which a [`Sweeper`](super::Sweeper) calls periodically.
pub struct MemoryStore<K, V> {
    records: DashMap<K, Record<V>>,
}

impl<K, V> fmt::Debug for MemoryStore<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.len())
            .finish()
    }
}

impl<K, V> MemoryStore<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Create an empty store with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
        }
    }

    /// Remove every expired record, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(self.records.len());
        trace!(removed, remaining = self.records.len(), "Swept expired records");
        removed
    }

    /// Number of records held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<K, V> Default for MemoryStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let record = self.records.get(key)?;
            if !record.is_expired(now) {
                return Some(record.value.clone());
            }
        }
        // The read guard is released above; re-check so a concurrent `set` is not lost.
        self.records.remove_if(key, |_, record| record.is_expired(now));
        None
    }

    fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now().checked_add(ttl);
        self.records.insert(key, Record { value, expires_at });
    }

    fn delete(&self, key: &K) {
        self.records.remove(key);
    }
}
