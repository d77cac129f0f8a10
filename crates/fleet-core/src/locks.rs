//! Per-shipment serialization.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One mutex per shipment id, created on first use.
///
/// Guards are blocking `std` mutex guards. Callers hold them only across
/// synchronous store work, never across an `.await`.
#[derive(Debug, Default)]
pub struct ShipmentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ShipmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `shipment_id`; lock it with [`ShipmentLocks::acquire`].
    pub fn handle(&self, shipment_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(shipment_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub fn acquire(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
        handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the entry for a finished shipment unless a caller still holds
    /// its handle.
    pub fn release(&self, shipment_id: &str) -> bool {
        self.locks
            .remove_if(shipment_id, |_, handle| Arc::strong_count(handle) == 1)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
