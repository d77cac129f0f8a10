//! Persistence loop.
//!
//! Coalesces store changes by record key and writes them in periodic
//! transactions, backing off while the database is failing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;

use fleet_core::Change;

use crate::backoff::Backoff;
use crate::persistence::{write_changes, Database};
use crate::state::{ChangeKey, PersistQueue};

const FLUSH_INTERVAL_MS: u64 = 500;
const DB_BACKOFF_MAX_SECS: u64 = 30;

pub async fn run_persist_loop(
    db: Database,
    queue: Arc<PersistQueue>,
    mut rx: mpsc::Receiver<Change>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_millis(FLUSH_INTERVAL_MS));
    let mut backoff = Backoff::new(
        Duration::from_millis(FLUSH_INTERVAL_MS),
        Duration::from_secs(DB_BACKOFF_MAX_SECS),
    );
    let mut pending: HashMap<ChangeKey, Change> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Persistence loop shutting down");
                break;
            }
            maybe_change = rx.recv() => {
                match maybe_change {
                    Some(change) => {
                        pending.insert(change.key(), change);
                        collect_pending(&queue, &mut pending, &mut rx);
                    }
                    None => {
                        tracing::info!("Persistence channel closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                collect_pending(&queue, &mut pending, &mut rx);
                if !backoff.ready() {
                    continue;
                }
                match flush_pending(&db, &mut pending).await {
                    Ok(0) => {}
                    Ok(written) => {
                        backoff.reset();
                        tracing::debug!(written, "Persisted fleet changes");
                    }
                    Err(err) => {
                        let delay = backoff.fail();
                        tracing::warn!(
                            "Persistence flush failed: {} (backing off {:?})",
                            err,
                            delay
                        );
                    }
                }
            }
        }
    }

    collect_pending(&queue, &mut pending, &mut rx);
    if let Err(err) = flush_pending(&db, &mut pending).await {
        tracing::warn!("Persistence final flush failed: {}", err);
    }
}

/// Pull in everything queued. The channel goes first: once spilling, the
/// overflow holds the newest copy of a record and must win.
fn collect_pending(
    queue: &PersistQueue,
    pending: &mut HashMap<ChangeKey, Change>,
    rx: &mut mpsc::Receiver<Change>,
) {
    drain_queue(pending, rx);
    merge_overflow(queue, pending);
}

fn drain_queue(pending: &mut HashMap<ChangeKey, Change>, rx: &mut mpsc::Receiver<Change>) {
    while let Ok(change) = rx.try_recv() {
        pending.insert(change.key(), change);
    }
}

fn merge_overflow(queue: &PersistQueue, pending: &mut HashMap<ChangeKey, Change>) {
    for change in queue.take_overflow() {
        pending.insert(change.key(), change);
    }
}

/// Write everything pending. On failure the batch is put back, without
/// replacing newer copies that arrived meanwhile.
async fn flush_pending(
    db: &Database,
    pending: &mut HashMap<ChangeKey, Change>,
) -> anyhow::Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }

    let batch = std::mem::take(pending);
    let changes: Vec<Change> = batch.values().cloned().collect();
    if let Err(err) = write_changes(db.pool(), &changes).await {
        for (key, change) in batch {
            pending.entry(key).or_insert(change);
        }
        return Err(err);
    }
    Ok(changes.len())
}
