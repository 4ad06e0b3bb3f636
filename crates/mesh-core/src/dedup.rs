//! Bounded seen-frame cache used to suppress relay loops and duplicate
//! delivery.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashSet;

/// How long a dedup key is remembered.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Soft cap on tracked keys; once exceeded the oldest keys are evicted
/// regardless of age.
pub const DEDUP_SOFT_CAP: usize = 4096;

/// Tracks recently seen frame dedup keys with a time window and a size cap.
pub struct DedupSet {
    seen: DashSet<[u8; 32]>,
    order: std::sync::Mutex<VecDeque<([u8; 32], Instant)>>,
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupSet {
    /// Create an empty dedup set.
    #[must_use]
    pub fn new() -> Self {
        Self { seen: DashSet::new(), order: std::sync::Mutex::new(VecDeque::new()) }
    }

    /// Record `key` and report whether it had already been seen.
    ///
    /// Returns `true` if this is the first time `key` is observed (the
    /// caller should process/relay the frame); `false` if it is a duplicate
    /// (the caller should drop it).
    pub fn insert(&self, key: [u8; 32]) -> bool {
        self.evict_expired();
        let first_seen = self.seen.insert(key);
        if first_seen {
            let mut order = self.order.lock().unwrap();
            order.push_back((key, Instant::now()));
            if order.len() > DEDUP_SOFT_CAP {
                if let Some((oldest, _)) = order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
        first_seen
    }

    fn evict_expired(&self) {
        let mut order = self.order.lock().unwrap();
        while let Some((key, seen_at)) = order.front() {
            if seen_at.elapsed() > DEDUP_WINDOW {
                let key = *key;
                order.pop_front();
                self.seen.remove(&key);
            } else {
                break;
            }
        }
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
