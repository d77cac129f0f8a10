//! Hand-off of store writes to the persistence loop.

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use fleet_core::{Change, ChangeSink};

pub type ChangeKey = (&'static str, String);

/// Non-blocking sink: changes go through a bounded channel, and spill into
/// a keyed overflow map when the channel is full.
pub struct PersistQueue {
    tx: mpsc::Sender<Change>,
    overflow: DashMap<ChangeKey, Change>,
}

impl PersistQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Change>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                overflow: DashMap::new(),
            },
            rx,
        )
    }

    /// Remove and return everything that spilled over.
    pub fn take_overflow(&self) -> Vec<Change> {
        let keys: Vec<ChangeKey> = self.overflow.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.overflow.remove(&key).map(|(_, change)| change))
            .collect()
    }

    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }
}

impl ChangeSink for PersistQueue {
    fn record(&self, change: Change) {
        // once spilling, keep spilling so the overflow always holds the newest copy
        if !self.overflow.is_empty() {
            self.overflow.insert(change.key(), change);
            return;
        }
        if let Err(err) = self.tx.try_send(change) {
            let change = match err {
                TrySendError::Full(change) | TrySendError::Closed(change) => change,
            };
            tracing::debug!(table = change.key().0, "Persist queue full; spilling to overflow");
            self.overflow.insert(change.key(), change);
        }
    }
}
