//! Sliding Limiter - per-key sliding-window rate limiting
//!
//! This crate answers, for any hashable key, whether that key has recorded
//! `limit` or more events within a trailing time window. Event timestamps are
//! kept per key in an expiring store whose records outlive the window by one
//! second, so idle keys are reclaimed without any caller-driven cleanup.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;

pub use config::{LimiterConfig, Settings, StoreConfig};
pub use error::{LimiterError, Result};
pub use ratelimit::{Clock, Entry, KeyLocks, Limiter, ManualClock, SerializedLimiter, SystemClock};
pub use store::{ExpiringStore, MemoryStore, Sweeper};
