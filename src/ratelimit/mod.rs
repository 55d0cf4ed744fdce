//! Sliding-window rate limiting over an expiring store.

mod clock;
mod entry;
mod limiter;
mod serialized;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::Entry;
pub use limiter::Limiter;
pub use serialized::{KeyLocks, SerializedLimiter};
