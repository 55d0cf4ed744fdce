//! Core sliding-window rate limiter.

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::{LimiterConfig, Settings};
use crate::error::Result;
use crate::store::{ExpiringStore, MemoryStore, Sweeper};

use super::clock::{Clock, SystemClock};
use super::entry::Entry;

/// A per-key sliding-window rate limiter.
///
/// Each key owns an [`Entry`] of event timestamps kept in an [`ExpiringStore`].
/// A key is limited while at least `limit` of its events are newer than
/// `now - window`; nothing else is remembered between calls.
///
/// # Concurrency
///
/// Every operation is safe to call from many threads, but [`increment`]
/// is a fetch-then-replace that is **not** atomic: two concurrent increments
/// on the same key may read the same entry, and the later write wins, losing
/// one event. Use [`SerializedLimiter`](super::SerializedLimiter) when exact
/// counts under concurrency are required.
///
/// [`increment`]: Limiter::increment
pub struct Limiter<K, S = MemoryStore<K, Entry>, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    config: LimiterConfig,
    /// Keeps the background sweep alive for limiters that own their store
    sweeper: Option<Sweeper>,
    _key: PhantomData<fn(K)>,
}

impl<K> Limiter<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create a limiter allowing `limit` events per key within `window`,
    /// backed by an in-memory store swept every `window + 1s`.
    pub fn new(limit: usize, window: Duration) -> Result<Self> {
        Self::from_settings(&Settings {
            limiter: LimiterConfig::new(limit, window)?,
            ..Settings::default()
        })
    }

    /// Create a limiter and its in-memory store from loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.limiter.validate()?;
        let store = Arc::new(MemoryStore::with_capacity(settings.store.initial_capacity));
        let sweeper = Sweeper::spawn(&store, settings.store.sweep_interval(&settings.limiter))?;

        let mut limiter = Self::with_store(settings.limiter, store, SystemClock)?;
        limiter.sweeper = Some(sweeper);
        Ok(limiter)
    }
}

impl<K, S, C> Limiter<K, S, C>
where
    K: Eq + Hash + Clone,
    S: ExpiringStore<K, Entry>,
    C: Clock,
{
    /// Create a limiter over a caller-provided store and clock.
    ///
    /// The caller is responsible for the store's background expiry.
    pub fn with_store(config: LimiterConfig, store: Arc<S>, clock: C) -> Result<Self> {
        config.validate()?;
        debug!(
            limit = config.limit,
            window_secs = config.window_secs,
            "Creating sliding window limiter"
        );
        Ok(Self {
            store,
            clock,
            config,
            sweeper: None,
            _key: PhantomData,
        })
    }

    /// Replace the time source, keeping the store and any sweeper.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Limiter<K, S, C2> {
        Limiter {
            store: self.store,
            clock,
            config: self.config,
            sweeper: self.sweeper,
            _key: PhantomData,
        }
    }

    /// Whether `key` has at least `limit` unexpired events.
    ///
    /// Keys never incremented are not limited. Has no side effects.
    pub fn is_limited(&self, key: &K) -> bool {
        match self.store.get(key) {
            Some(entry) => entry.reaches(self.cutoff(), self.config.limit),
            None => false,
        }
    }

    /// Record one event for `key` at the current time.
    ///
    /// Prunes the stored history first once it holds `2 * limit` timestamps,
    /// then writes it back with a TTL of `window + 1s`. Not atomic with
    /// respect to concurrent increments of the same key.
    pub fn increment(&self, key: &K) {
        let now = self.clock.now_secs();
        let mut entry = self.store.get(key).unwrap_or_default();

        if entry.len() >= self.config.prune_threshold() {
            let before = entry.len();
            entry = entry.prune(now.saturating_sub(self.window_secs()));
            trace!(before, after = entry.len(), "Pruned expired timestamps");
        }

        entry.push(now);
        self.store.set(key.clone(), entry, self.config.record_ttl());
    }

    /// Forget all history for `key`.
    pub fn remove(&self, key: &K) {
        self.store.delete(key);
    }

    /// Number of unexpired events for `key`, zero if unknown.
    pub fn count(&self, key: &K) -> usize {
        match self.store.get(key) {
            Some(entry) => entry.count_since(self.cutoff()),
            None => 0,
        }
    }

    /// Maximum unexpired events allowed per key.
    pub fn limit(&self) -> usize {
        self.config.limit
    }

    /// The trailing window over which events count.
    pub fn window(&self) -> Duration {
        self.config.window()
    }

    /// The limiter's immutable configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn window_secs(&self) -> i64 {
        i64::try_from(self.config.window_secs).unwrap_or(i64::MAX)
    }

    /// Timestamps at or before this instant are expired.
    fn cutoff(&self) -> i64 {
        self.clock.now_secs().saturating_sub(self.window_secs())
    }
}
