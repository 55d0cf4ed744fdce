//! Limiter variant that serializes writes per key.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::{Mutex, MutexGuard};

use crate::store::{ExpiringStore, MemoryStore};

use super::clock::{Clock, SystemClock};
use super::entry::Entry;
use super::limiter::Limiter;

/// Default number of lock stripes.
const DEFAULT_STRIPES: usize = 64;

/// A fixed set of mutexes that keys are hashed onto.
///
/// Two different keys may share a stripe; a key always maps to the same one.
pub struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
    hasher: RandomState,
}

impl KeyLocks {
    /// Create a lock set with `stripes` mutexes (at least one).
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            hasher: RandomState::new(),
        }
    }

    /// Block until the stripe guarding `key` is held.
    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        let index = (self.hasher.hash_one(key) % self.stripes.len() as u64) as usize;
        self.stripes[index].lock()
    }

    /// Number of stripes.
    pub fn stripes(&self) -> usize {
        self.stripes.len()
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

/// A [`Limiter`] whose writes to the same key never interleave.
///
/// `increment`, `remove` and `try_acquire` hold the key's lock stripe across
/// the whole fetch-then-replace, so concurrent increments are never lost.
/// Reads do not lock.
pub struct SerializedLimiter<K, S = MemoryStore<K, Entry>, C = SystemClock> {
    limiter: Limiter<K, S, C>,
    locks: KeyLocks,
}

impl<K, S, C> SerializedLimiter<K, S, C>
where
    K: Eq + Hash + Clone,
    S: ExpiringStore<K, Entry>,
    C: Clock,
{
    /// Wrap `limiter` with the default number of lock stripes.
    pub fn new(limiter: Limiter<K, S, C>) -> Self {
        Self::with_locks(limiter, KeyLocks::default())
    }

    /// Wrap `limiter` with a caller-sized lock set.
    pub fn with_locks(limiter: Limiter<K, S, C>, locks: KeyLocks) -> Self {
        Self { limiter, locks }
    }

    /// See [`Limiter::is_limited`].
    pub fn is_limited(&self, key: &K) -> bool {
        self.limiter.is_limited(key)
    }

    /// See [`Limiter::count`].
    pub fn count(&self, key: &K) -> usize {
        self.limiter.count(key)
    }

    /// Record one event for `key`, excluding other writers of the same key.
    pub fn increment(&self, key: &K) {
        let _guard = self.locks.lock(key);
        self.limiter.increment(key);
    }

    /// Forget all history for `key`, after any in-flight write to it.
    pub fn remove(&self, key: &K) {
        let _guard = self.locks.lock(key);
        self.limiter.remove(key);
    }

    /// Record an event only if `key` is not limited, returning whether it was.
    ///
    /// The check and the write happen under the key's lock, so concurrent
    /// callers can never admit more than `limit` events per window.
    pub fn try_acquire(&self, key: &K) -> bool {
        let _guard = self.locks.lock(key);
        if self.limiter.is_limited(key) {
            return false;
        }
        self.limiter.increment(key);
        true
    }

    /// The wrapped limiter.
    pub fn limiter(&self) -> &Limiter<K, S, C> {
        &self.limiter
    }
}
