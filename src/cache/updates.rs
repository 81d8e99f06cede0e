//! Cache update notifications.
//!
//! Writers broadcast `(key, stamp)` pairs. Listeners keep an [`UpdateTracker`]
//! and act only on updates newer than the last one they applied for a key,
//! so a late or duplicated notification can never roll state back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::broadcast;

/// Buffered notifications per subscriber before the slowest one lags.
const CHANNEL_CAPACITY: usize = 256;

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Written,
    Invalidated,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
    pub key: String,
    /// Strictly increasing per publisher; milliseconds since the Unix epoch
    /// unless several updates share a millisecond.
    pub stamp: u64,
    pub kind: UpdateKind,
}

// == Update Bus ==
/// Publish side of the notification channel.
#[derive(Debug)]
pub struct UpdateBus {
    sender: broadcast::Sender<CacheUpdate>,
    last_stamp: AtomicU64,
}

impl UpdateBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            last_stamp: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.sender.subscribe()
    }

    /// Broadcasts an update and returns its stamp.
    pub fn publish(&self, key: &str, kind: UpdateKind) -> u64 {
        let stamp = self.next_stamp();
        // No subscribers is not an error
        let _ = self.sender.send(CacheUpdate {
            key: key.to_string(),
            stamp,
            kind,
        });
        stamp
    }

    /// Wall-clock milliseconds, bumped past the previous stamp when the clock
    /// stalls or steps backwards.
    fn next_stamp(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .last_stamp
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

// == Update Tracker ==
/// Last-writer-wins filter for received updates.
#[derive(Debug, Default)]
pub struct UpdateTracker {
    applied: HashMap<String, u64>,
}

impl UpdateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `update` if it is newer than anything applied for its key.
    ///
    /// Returns false for stale or duplicate updates, which the caller should
    /// ignore.
    pub fn apply(&mut self, update: &CacheUpdate) -> bool {
        match self.applied.get(&update.key) {
            Some(&last) if last >= update.stamp => false,
            _ => {
                self.applied.insert(update.key.clone(), update.stamp);
                true
            }
        }
    }

    /// Stamp of the last applied update for `key`.
    pub fn last_applied(&self, key: &str) -> Option<u64> {
        self.applied.get(key).copied()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn update(key: &str, stamp: u64) -> CacheUpdate {
        CacheUpdate {
            key: key.to_string(),
            stamp,
            kind: UpdateKind::Written,
        }
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let bus = UpdateBus::new();
        let stamps: Vec<u64> = (0..1000)
            .map(|_| bus.publish("k", UpdateKind::Written))
            .collect();

        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_subscriber_receives_updates() {
        let bus = UpdateBus::new();
        let mut rx = bus.subscribe();

        let stamp = bus.publish("messages:u1:c1", UpdateKind::Invalidated);
        let received = rx.recv().await.unwrap();

        assert_eq!(received.key, "messages:u1:c1");
        assert_eq!(received.stamp, stamp);
        assert_eq!(received.kind, UpdateKind::Invalidated);
    }

    #[test]
    fn test_tracker_rejects_stale_updates() {
        let mut tracker = UpdateTracker::new();

        assert!(tracker.apply(&update("k", 10)));
        assert!(!tracker.apply(&update("k", 5)));
        assert!(!tracker.apply(&update("k", 10)));
        assert!(tracker.apply(&update("k", 11)));
        assert_eq!(tracker.last_applied("k"), Some(11));
    }

    #[test]
    fn test_tracker_keys_are_independent() {
        let mut tracker = UpdateTracker::new();

        assert!(tracker.apply(&update("a", 10)));
        assert!(tracker.apply(&update("b", 1)));
        assert_eq!(tracker.last_applied("c"), None);
    }
}
