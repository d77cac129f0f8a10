//! Shared application state.

mod queue;

pub use queue::{ChangeKey, PersistQueue};

use chrono::{DateTime, Utc};
use std::sync::Arc;

use fleet_core::{
    AlertDesk, AlertEngine, ChangeSink, DispatchAllocator, LocationIngest, MemoryStore,
    ShipmentLocks, Snapshot,
};

use crate::config::Config;

/// Services over one shared store.
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub dispatch: DispatchAllocator<MemoryStore>,
    pub ingest: LocationIngest<MemoryStore>,
    pub alerts: AlertDesk<MemoryStore>,
    persist: Option<Arc<PersistQueue>>,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// State without persistence.
    pub fn new(config: &Config) -> Self {
        Self::build(config, MemoryStore::new(), None)
    }

    /// State whose writes are queued for the persistence loop, preloaded
    /// with `snapshot`.
    pub fn with_persistence(config: &Config, queue: Arc<PersistQueue>, snapshot: Snapshot) -> Self {
        let sink: Arc<dyn ChangeSink> = queue.clone();
        let store = MemoryStore::with_sink(sink);
        store.restore(snapshot);
        Self::build(config, store, Some(queue))
    }

    fn build(config: &Config, store: MemoryStore, persist: Option<Arc<PersistQueue>>) -> Self {
        let store = Arc::new(store);
        let locks = Arc::new(ShipmentLocks::new());
        Self {
            dispatch: DispatchAllocator::new(
                store.clone(),
                locks.clone(),
                config.pricing.clone(),
                config.routing.clone(),
            ),
            ingest: LocationIngest::new(
                store.clone(),
                locks,
                AlertEngine::new(config.thresholds.clone()),
                config.ingest.clone(),
                config.routing.clone(),
            ),
            alerts: AlertDesk::new(store.clone()),
            store,
            persist,
            started_at: Utc::now(),
        }
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persist.is_some()
    }

    /// Changes waiting in the overflow map.
    pub fn persist_backlog(&self) -> usize {
        self.persist.as_ref().map_or(0, |queue| queue.overflow_len())
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
