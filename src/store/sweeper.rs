//! Background sweep task for [`MemoryStore`].

use std::hash::Hash;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};

use super::MemoryStore;

/// Handle to a thread that periodically removes expired records from a store.
///
/// The thread holds only a weak reference, so it exits on its own once the
/// store is dropped. Dropping the handle stops it as well.
#[derive(Debug)]
pub struct Sweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `store` every `interval`.
    pub fn spawn<K, V>(store: &Arc<MemoryStore<K, V>>, interval: Duration) -> std::io::Result<Self>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let store: Weak<MemoryStore<K, V>> = Arc::downgrade(store);
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("store-sweeper".to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "Store sweeper started");
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Explicit stop, or the handle was dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let Some(store) = store.upgrade() else {
                        break;
                    };
                    let removed = store.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = store.len(), "Store sweep removed expired records");
                    } else {
                        trace!("Store sweep found nothing to remove");
                    }
                }
                debug!("Store sweeper stopped");
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the sweep thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The thread may already have exited after its store was dropped
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the sweep thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExpiringStore;

    #[test]
    fn test_sweeper_removes_expired_records() {
        let store = Arc::new(MemoryStore::new());
        store.set("stale", 1, Duration::from_millis(10));
        store.set("live", 2, Duration::from_secs(60));

        let _sweeper = Sweeper::spawn(&store, Duration::from_millis(20)).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        // Removed without any caller touching the stale key
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"live"), Some(2));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let store: Arc<MemoryStore<&str, u32>> = Arc::new(MemoryStore::new());
        let mut sweeper = Sweeper::spawn(&store, Duration::from_millis(10)).unwrap();
        assert!(sweeper.is_running());

        sweeper.stop();
        sweeper.stop();
        assert!(!sweeper.is_running());
    }

    #[test]
    fn test_stopped_sweeper_leaves_records() {
        let store = Arc::new(MemoryStore::new());
        store.set("stale", 1, Duration::from_millis(10));

        let mut sweeper = Sweeper::spawn(&store, Duration::from_millis(20)).unwrap();
        sweeper.stop();
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweeper_exits_when_store_dropped() {
        let store: Arc<MemoryStore<&str, u32>> = Arc::new(MemoryStore::new());
        let sweeper = Sweeper::spawn(&store, Duration::from_millis(10)).unwrap();
        drop(store);

        std::thread::sleep(Duration::from_millis(100));
        assert!(!sweeper.is_running());
    }
}
