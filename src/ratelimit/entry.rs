//! Per-key event history.

/// Event timestamps recorded for one key, oldest first.
///
/// Timestamps are whole seconds since the Unix epoch. A timestamp is
/// unexpired when it is strictly greater than the cutoff `now - window`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    timestamps: Vec<i64>,
}

impl Entry {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored timestamps, expired ones included.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no timestamps are stored.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The stored timestamps in insertion order.
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Append an event timestamp.
    pub(crate) fn push(&mut self, timestamp: i64) {
        self.timestamps.push(timestamp);
    }

    /// Count timestamps newer than `cutoff`. Scans every element.
    pub fn count_since(&self, cutoff: i64) -> usize {
        self.timestamps.iter().filter(|&&ts| ts > cutoff).count()
    }

    /// Whether at least `limit` timestamps are newer than `cutoff`.
    ///
    /// Stops scanning as soon as `limit` is reached.
    pub fn reaches(&self, cutoff: i64, limit: usize) -> bool {
        let mut count = 0;
        for &ts in &self.timestamps {
            if ts > cutoff {
                count += 1;
                if count >= limit {
                    return true;
                }
            }
        }
        false
    }

    /// Drop the expired prefix, keeping everything from the first timestamp
    /// newer than `cutoff` onwards.
    ///
    /// Assumes timestamps were recorded in non-decreasing order: an older
    /// timestamp appended after a newer one (a clock step back) survives the
    /// prune if it sits behind an unexpired one.
    pub fn prune(mut self, cutoff: i64) -> Self {
        match self.timestamps.iter().position(|&ts| ts > cutoff) {
            Some(0) => {}
            Some(first_live) => {
                self.timestamps.drain(..first_live);
            }
            None => self.timestamps.clear(),
        }
        self
    }
}

impl From<Vec<i64>> for Entry {
    fn from(timestamps: Vec<i64>) -> Self {
        Self { timestamps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_entry() {
        let entry = Entry::new();
        assert!(entry.is_empty());
        assert_eq!(entry.count_since(0), 0);
        assert!(!entry.reaches(0, 1));
    }

    #[test]
    fn test_count_since_excludes_cutoff() {
        let entry = Entry::from(vec![10, 11, 12, 13]);
        // A timestamp equal to the cutoff is expired
        assert_eq!(entry.count_since(11), 2);
        assert_eq!(entry.count_since(9), 4);
        assert_eq!(entry.count_since(13), 0);
    }

    #[test]
    fn test_reaches() {
        let entry = Entry::from(vec![10, 11, 12, 13]);
        assert!(entry.reaches(10, 3));
        assert!(!entry.reaches(10, 4));
        assert!(entry.reaches(0, 4));
        assert!(!entry.reaches(13, 1));
    }

    #[test]
    fn test_reaches_agrees_with_count() {
        let entry = Entry::from(vec![1, 2, 2, 3, 5, 8, 8, 9]);
        for cutoff in 0..10 {
            for limit in 1..10 {
                assert_eq!(
                    entry.reaches(cutoff, limit),
                    entry.count_since(cutoff) >= limit,
                    "cutoff={cutoff} limit={limit}"
                );
            }
        }
    }

    #[test]
    fn test_prune_drops_expired_prefix() {
        let entry = Entry::from(vec![1, 2, 3, 4, 5]).prune(3);
        assert_eq!(entry.timestamps(), &[4, 5]);
    }

    #[test]
    fn test_prune_keeps_fully_live_entry() {
        let entry = Entry::from(vec![4, 5, 6]);
        let ptr = entry.timestamps().as_ptr();
        let pruned = entry.prune(3);
        assert_eq!(pruned.timestamps(), &[4, 5, 6]);
        assert_eq!(pruned.timestamps().as_ptr(), ptr);
    }

    #[test]
    fn test_prune_fully_expired_entry() {
        let entry = Entry::from(vec![1, 2, 3]).prune(3);
        assert!(entry.is_empty());
    }

    #[test]
    fn test_prune_preserves_count() {
        let entry = Entry::from(vec![1, 1, 2, 5, 6, 6, 7]);
        for cutoff in 0..8 {
            let pruned = entry.clone().prune(cutoff);
            assert_eq!(pruned.count_since(cutoff), entry.count_since(cutoff));
        }
    }

    #[test]
    fn test_prune_retains_out_of_order_stale_timestamp() {
        // 2 was appended after 9, so it hides behind a live timestamp
        let entry = Entry::from(vec![1, 9, 2, 10]).prune(5);
        assert_eq!(entry.timestamps(), &[9, 2, 10]);
        assert_eq!(entry.count_since(5), 2);
    }
}
